use std::io;
use std::io::IsTerminal;

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn is_stdout_tty() -> bool {
    io::stdout().is_terminal()
}

/// Whether the invoking session can host an interactive exec.
pub fn is_interactive() -> bool {
    is_stdin_tty() && is_stdout_tty()
}
