//! Command-line interface definitions for the `caravan` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `caravan` binary.
#[derive(Debug, Parser)]
#[command(
    name = "caravan",
    about = "Provision, exercise, and tear down a cross-region copy pipeline",
    arg_required_else_help = true
)]
pub enum Cli {
    /// Provision every resource group in dependency order.
    #[command(
        name = "deploy",
        about = "Provision every resource group in dependency order"
    )]
    Deploy,
    /// Provision a single resource group.
    #[command(name = "provision", about = "Provision a single resource group")]
    Provision(ProvisionCommand),
    /// Drive a sample file through the provisioned pipeline.
    #[command(
        name = "exercise",
        about = "Drive a sample file through the provisioned pipeline"
    )]
    Exercise,
    /// Print the aggregate deployment status table.
    #[command(name = "status", about = "Print the aggregate deployment status table")]
    Status,
    /// Delete every pipeline resource after interactive confirmation.
    #[command(
        name = "unwind",
        about = "Delete every pipeline resource after confirmation"
    )]
    Unwind,
}

/// Arguments for the `caravan provision` subcommand.
#[derive(Debug, Parser)]
pub struct ProvisionCommand {
    /// Resource group to provision.
    ///
    /// The group runs regardless of its recorded status; lookups still
    /// short-circuit over resources that already exist.
    #[arg(value_enum)]
    pub group: ProvisionGroup,
}

/// Resource groups addressable from the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProvisionGroup {
    /// Service role and the source and target buckets.
    Foundation,
    /// Notification topic, delivery queue, and copy function.
    Messaging,
    /// Catalog database, classifier, and crawler.
    Catalog,
    /// Bucket notifications, results bucket, and query workgroup.
    Analytics,
}
