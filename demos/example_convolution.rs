use wgscan::{convolve, HostExecutor, SquareMatrix};

fn main() -> wgscan::Result<()> {
    let executor = HostExecutor::new(wgscan::DEFAULT_BLOCK_SIZE)?;

    let a = SquareMatrix::from_row_major(3, (1..=9).map(f64::from).collect())
        .expect("3x3 input");
    let mask = SquareMatrix::from_row_major(3, vec![0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0])
        .expect("3x3 mask");

    let c = convolve(&executor, &a, &mask)?;
    for row in 0..c.size() {
        println!("{:?}", c.row(row));
    }
    Ok(())
}
