// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Interactive operator input used during registration.
//!
//! Activation only sees the [`OperatorPrompts`] trait; [`TerminalPrompts`]
//! is the implementation wired in by `main`.

use std::io::{self, BufRead, Write};

/// Questions asked to the operator while registering.
pub trait OperatorPrompts: Send + Sync {
    /// Name of the encrypted volume holding the key storage.
    fn volume_name(&self) -> io::Result<String>;

    /// Whether the volume password must be destroyed after use.
    fn dispose_password(&self) -> io::Result<bool>;

    /// Volume password (not echoed).
    fn volume_password(&self) -> io::Result<String>;

    /// Number to register with the transport.
    fn phone_number(&self) -> io::Result<String>;

    /// Verification code received for the number.
    fn verification_code(&self) -> io::Result<String>;
}

/// Prompts on stdout, reads answers from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompts;

impl TerminalPrompts {
    fn read_line(prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(strip_line_ending(&line).to_string())
    }
}

impl OperatorPrompts for TerminalPrompts {
    fn volume_name(&self) -> io::Result<String> {
        Self::read_line("\nPlease enter encrypted volume name for messaging key storage: ")
    }

    fn dispose_password(&self) -> io::Result<bool> {
        let answer = Self::read_line(
            "\nIf you would like to have the password disposed of after use enter YES all\nuppercase: ",
        )?;

        let dispose = answer == "YES";
        if dispose {
            println!(
                "\nWARNING: password will be destroyed after its use!\n(quit now if this is undesired)"
            );
        }
        Ok(dispose)
    }

    fn volume_password(&self) -> io::Result<String> {
        rpassword::prompt_password("Please enter volume password (will not echo): ")
    }

    fn phone_number(&self) -> io::Result<String> {
        Self::read_line("\nPlease enter the mobile number to be used for registration: ")
    }

    fn verification_code(&self) -> io::Result<String> {
        Self::read_line("Please enter the verification code received for the number: ")
    }
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}
