//! Administrator-only plugins
//!
//! `admin` itself only carries help; the work is done by `admin.network` and `admin.ignore`.

pub mod ignore;
pub mod network;

use crate::commander::Command;
use crate::plugins::Plugin;
use crate::reply::Destination;

pub fn plugin() -> Plugin {
    Plugin::new("admin").with_help(
        "main",
        &[
            "Administrative tools, available to administrators only.",
            "Available sub-plugins: <strong>network, ignore</strong>",
        ],
    )
}

/// Admin replies never go to the channel
fn destination(command: &Command) -> Destination {
    if command.public {
        Destination::PrivateNotice
    } else {
        Destination::Private
    }
}
