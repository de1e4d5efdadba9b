//! WGSL sources of the device kernels.
//!
//! `{{ BLOCK_SIZE }}` and `{{ TILE }}` are substituted before compilation, so
//! one compiled program serves exactly one block size.
//!
//! The scan kernels flatten a 2D work-group id into one block index, so a
//! one-dimensional launch may be folded onto X and Y when it has more groups
//! than a single dispatch dimension allows.

use crate::executor::{Kernel, CONVOLUTION_TILE};

const BLOCK_PREFIX_SUM_KERNEL: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<f64>;
@group(0) @binding(1) var<storage, read_write> output: array<f64>;

struct Params {
    len: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(2) var<uniform> params: Params;

var<workgroup> scratch: array<f64, {{ BLOCK_SIZE }}>;

@compute
@workgroup_size({{ BLOCK_SIZE }})
fn main(
    @builtin(workgroup_id) group_id: vec3<u32>,
    @builtin(num_workgroups) num_groups: vec3<u32>,
    @builtin(local_invocation_id) local_id: vec3<u32>,
) {
    let group_index = group_id.x + group_id.y * num_groups.x;
    let l = local_id.x;
    let i = group_index * {{ BLOCK_SIZE }}u + l;

    // Padding work-items contribute zero but still reach every barrier.
    var value = f64(0.0);
    if (i < params.len) {
        value = input[i];
    }
    scratch[l] = value;
    workgroupBarrier();

    for (var offset = 1u; offset < {{ BLOCK_SIZE }}u; offset = offset << 1u) {
        var addend = f64(0.0);
        if (l >= offset) {
            addend = scratch[l - offset];
        }
        workgroupBarrier();
        scratch[l] = scratch[l] + addend;
        workgroupBarrier();
    }

    if (i < params.len) {
        output[i] = scratch[l];
    }
}
"#;

const PARTIAL_COPY_KERNEL: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<f64>;
@group(0) @binding(1) var<storage, read_write> output: array<f64>;

struct Params {
    from_len: u32,
    to_len: u32,
    _pad0: u32,
    _pad1: u32,
};

@group(0) @binding(2) var<uniform> params: Params;

@compute
@workgroup_size({{ BLOCK_SIZE }})
fn main(
    @builtin(workgroup_id) group_id: vec3<u32>,
    @builtin(num_workgroups) num_groups: vec3<u32>,
    @builtin(local_invocation_id) local_id: vec3<u32>,
) {
    let group_index = group_id.x + group_id.y * num_groups.x;
    let i = group_index * {{ BLOCK_SIZE }}u + local_id.x;
    if (i >= params.from_len) {
        return;
    }
    let next = i + 1u;
    if (next % {{ BLOCK_SIZE }}u == 0u) {
        let slot = next / {{ BLOCK_SIZE }}u;
        if (slot < params.to_len) {
            output[slot] = input[i];
        }
    }
}
"#;

const BLOCK_ADD_KERNEL: &str = r#"
@group(0) @binding(0) var<storage, read> offsets: array<f64>;
@group(0) @binding(1) var<storage, read> input: array<f64>;
@group(0) @binding(2) var<storage, read_write> output: array<f64>;

struct Params {
    len: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(3) var<uniform> params: Params;

@compute
@workgroup_size({{ BLOCK_SIZE }})
fn main(
    @builtin(workgroup_id) group_id: vec3<u32>,
    @builtin(num_workgroups) num_groups: vec3<u32>,
    @builtin(local_invocation_id) local_id: vec3<u32>,
) {
    let group_index = group_id.x + group_id.y * num_groups.x;
    let i = group_index * {{ BLOCK_SIZE }}u + local_id.x;
    if (i >= params.len) {
        return;
    }
    output[i] = input[i] + offsets[i / {{ BLOCK_SIZE }}u];
}
"#;

const CONVOLUTION_KERNEL: &str = r#"
@group(0) @binding(0) var<storage, read> a: array<f64>;
@group(0) @binding(1) var<storage, read> mask: array<f64>;
@group(0) @binding(2) var<storage, read_write> output: array<f64>;

struct Params {
    n: u32,
    m: u32,
    _pad0: u32,
    _pad1: u32,
};

@group(0) @binding(3) var<uniform> params: Params;

@compute
@workgroup_size({{ TILE }}, {{ TILE }})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let row = global_id.x;
    let col = global_id.y;
    let n = params.n;
    let m = params.m;
    if (row >= n || col >= n) {
        return;
    }

    let radius = (i32(m) - 1) / 2;
    var acc = f64(0.0);
    for (var k = 0u; k < m; k = k + 1u) {
        let r = i32(row) + i32(k) - radius;
        if (r < 0 || r >= i32(n)) {
            continue;
        }
        for (var l = 0u; l < m; l = l + 1u) {
            let c = i32(col) + i32(l) - radius;
            if (c < 0 || c >= i32(n)) {
                continue;
            }
            acc = acc + a[u32(r) * n + u32(c)] * mask[k * m + l];
        }
    }
    output[row * n + col] = acc;
}
"#;

/// Source of `kernel` specialized for `block_size`.
pub fn source(kernel: Kernel, block_size: usize) -> String {
    let template = match kernel {
        Kernel::BlockPrefixSum => BLOCK_PREFIX_SUM_KERNEL,
        Kernel::PartialCopy => PARTIAL_COPY_KERNEL,
        Kernel::BlockAdd => BLOCK_ADD_KERNEL,
        Kernel::Convolution => CONVOLUTION_KERNEL,
    };
    template
        .replace("{{ BLOCK_SIZE }}", &block_size.to_string())
        .replace("{{ TILE }}", &CONVOLUTION_TILE.to_string())
}
