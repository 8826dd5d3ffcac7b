//! Subcommand surface (§6). One variant per operation the manager exposes;
//! argument names mirror the manager's parameter names so the mapping in
//! `main.rs` is a straight field pass-through.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "memoh", about = "Per-user container lifecycle and versioned filesystem")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Pulls the configured base image if it is not already present.
    Init,

    /// Lists containers known to the runtime.
    List,

    /// Ensures a container exists for the given user, creating it if absent.
    Create { user_id: String },

    /// Starts the user's container task.
    Start { user_id: String },

    /// Stops the user's container task, waiting up to `timeout` for a clean exit.
    Stop {
        user_id: String,
        #[arg(long, default_value = "10s")]
        timeout: String,
    },

    /// Stops the task (if running) and deletes the container and its catalogue row.
    Delete { user_id: String },

    /// Runs a command inside the user's container, forwarding its exit code.
    Exec {
        user_id: String,
        #[arg(long)]
        cwd: Option<String>,
        #[arg(long)]
        tty: bool,
        #[arg(long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Snapshots the container's current filesystem state as a new version.
    #[command(name = "version-create")]
    VersionCreate { user_id: String },

    /// Lists versions for the user's container, oldest first.
    #[command(name = "version-list")]
    VersionList { user_id: String },

    /// Rolls the container's filesystem back to a prior version.
    #[command(name = "version-rollback")]
    VersionRollback { user_id: String, version: i32 },
}
