use crate::session::Credentials;
use std::io::{self, BufRead, Write};

/// Reads the username from stdin and the password without echo.
pub fn credentials() -> io::Result<Credentials> {
    let username = read_username(&mut io::stdin().lock(), &mut io::stdout())?;
    let password = rpassword::prompt_password("Enter password: ")?;
    Ok(Credentials::new(username, password))
}

fn read_username<R, W>(input: &mut R, out: &mut W) -> io::Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(out, "Enter username: ")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before a username was entered",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
