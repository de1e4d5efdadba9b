//! Text input and output of arrays and matrices.
//!
//! Input is whitespace-separated; output prints every value with three
//! decimals.

use std::io::{Read, Write};
use std::str::SplitWhitespace;

use crate::array::{NumericArray, SquareMatrix};
use crate::error::{Error, Result};

struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
        }
    }

    fn next_token(&mut self, what: &str) -> Result<&'a str> {
        self.inner
            .next()
            .ok_or_else(|| Error::Parse(format!("unexpected end of input, expected {what}")))
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let token = self.next_token(what)?;
        token
            .parse()
            .map_err(|_| Error::Parse(format!("expected {what}, found `{token}`")))
    }

    fn values(&mut self, len: usize, what: &str) -> Result<Vec<f64>> {
        (0..len)
            .map(|index| {
                let token = self.next_token(what)?;
                token.parse().map_err(|_| {
                    Error::Parse(format!("{what} #{index}: `{token}` is not a number"))
                })
            })
            .collect()
    }
}

fn read_text(mut reader: impl Read) -> Result<String> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

/// Reads a count `N` followed by `N` numbers.
pub fn read_array(reader: impl Read) -> Result<NumericArray> {
    let text = read_text(reader)?;
    parse_array(&text)
}

pub fn parse_array(text: &str) -> Result<NumericArray> {
    let mut tokens = Tokens::new(text);
    let len = tokens.count("element count")?;
    Ok(tokens.values(len, "element")?.into())
}

/// Reads `n m`, then the `n x n` matrix and the `m x m` mask, both row-major.
pub fn read_convolution_input(reader: impl Read) -> Result<(SquareMatrix, SquareMatrix)> {
    let text = read_text(reader)?;
    parse_convolution_input(&text)
}

pub fn parse_convolution_input(text: &str) -> Result<(SquareMatrix, SquareMatrix)> {
    let mut tokens = Tokens::new(text);
    let n = tokens.count("matrix size")?;
    let m = tokens.count("mask size")?;
    let cells = |size: usize| {
        size.checked_mul(size)
            .ok_or_else(|| Error::Parse(format!("size {size} is too large")))
    };
    let a = tokens.values(cells(n)?, "matrix element")?;
    let mask = tokens.values(cells(m)?, "mask element")?;
    let a = SquareMatrix::from_row_major(n, a)
        .ok_or_else(|| Error::Parse("matrix has the wrong number of elements".into()))?;
    let mask = SquareMatrix::from_row_major(m, mask)
        .ok_or_else(|| Error::Parse("mask has the wrong number of elements".into()))?;
    Ok((a, mask))
}

/// Writes the values space-separated on one line.
pub fn write_array(mut writer: impl Write, array: &NumericArray) -> Result<()> {
    write_row(&mut writer, array.as_slice())?;
    writer.flush()?;
    Ok(())
}

/// Writes one line per row.
pub fn write_matrix(mut writer: impl Write, matrix: &SquareMatrix) -> Result<()> {
    for row in 0..matrix.size() {
        write_row(&mut writer, matrix.row(row))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_row(writer: &mut impl Write, values: &[f64]) -> Result<()> {
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            writer.write_all(b" ")?;
        }
        write!(writer, "{value:.3}")?;
    }
    writeln!(writer)?;
    Ok(())
}
