//! Entry point for the qcparser binary.
//!
//! Delegates to [`qcparser::run()`] and translates failures into the
//! documented process exit codes: `0` success, `1` general error, `2`
//! invalid arguments, `3` file not found, `4` detection failed, `5`
//! conversion failed.

fn main() {
    if let Err(err) = qcparser::run() {
        std::process::exit(qcparser::error::exit_code_for(&err));
    }
}
