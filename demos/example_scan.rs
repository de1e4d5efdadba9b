use futures::executor::block_on;
use wgscan::{scan_inclusive, CompileOptions, NumericArray, WgContext, WgpuExecutor};

fn main() -> wgscan::Result<()> {
    let context = block_on(WgContext::new())?;
    let executor = WgpuExecutor::new(context, CompileOptions { block_size: 256 })?;

    let input_data: Vec<f64> = (1..=1000).map(f64::from).collect();
    println!("Input data:  {:?}..", &input_data[..8]);

    let mut array = NumericArray::from(input_data);
    scan_inclusive(&executor, &mut array)?;

    println!("Scan result: {:?}..", &array.as_slice()[..8]);
    println!("Last:        {}", array[array.len() - 1]);
    // [1, 3, 6, 10, 15, 21, 28, 36].. last 500500
    Ok(())
}
