/// Console rendering of the complexity figures.
use crate::complexity::Complexity;

use std::io::{self, Write};

const RULE: &str = "--------------------";
const TITLE: &str = "General N and C Calculator";

/// Formats a float the way Python's `repr` does: shortest round-trip digits,
/// `.0` on integral values, and `e+XX` notation outside `1e-4 <= |x| < 1e16`.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }

    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{:e}", x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };

    if exp < -4 || exp >= 16 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }

    let plain = format!("{}", x);

    if plain.contains('.') {
        plain
    } else {
        format!("{}.0", plain)
    }
}

/// Writes the banner and the four result lines.
pub fn render(c: &Complexity, exact: bool, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "{}", TITLE)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "N = {}", format_float(c.n))?;
    writeln!(out, "N log base 2 = {}", format_float(c.n_log2))?;
    writeln!(out, "C = {}", format_float(c.c))?;
    writeln!(out, "C log base 2 = {}", format_float(c.c_log2))?;

    if exact {
        writeln!(out, "C (exact) = {}", c.c_exact_string())?;
    }

    Ok(())
}

/// Prints the report to stdout.
pub fn print(c: &Complexity, exact: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();

    render(c, exact, &mut lock)?;
    lock.flush()
}
