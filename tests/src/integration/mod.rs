pub mod fixtures;

mod challenge;
mod channel_setup;
mod install_uninstall;
mod propose;
mod sync;
