use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Notify;
use url::Url;

mod controller;
mod install;
mod metadata;
mod parser;
mod process;
mod runtime;

use process::*;

pub use controller::*;
pub use install::*;
pub use metadata::*;
pub use parser::*;
pub use runtime::*;
