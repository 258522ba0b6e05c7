//! CLI module - Command-line interface for Tally
//!
//! This module provides a structured CLI using clap for argument parsing.

use clap::{Parser, Subcommand};

/// Tally - Team metrics reporting server
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    Init,

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user account (reads the password from stdin)
    Add {
        /// Login name for the new account
        username: String,

        /// Role: user, manager, or admin
        #[arg(long, default_value = "user")]
        role: String,
    },

    /// Reset a user's password (reads the new password from stdin)
    Passwd {
        /// Login name of the account
        username: String,
    },
}
