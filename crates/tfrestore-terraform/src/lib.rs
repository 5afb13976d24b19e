//! tfrestore Terraform driver
//!
//! Implements [`tfrestore_core::ProvisioningDriver`] by shelling out to the
//! `terraform` CLI with a local state file per workspace.

pub mod command;
pub mod driver;

pub use command::{TerraformCli, parse_outputs};
pub use driver::{DEFAULT_APPLY_TIMEOUT, STATE_FILE, TerraformDriver};
