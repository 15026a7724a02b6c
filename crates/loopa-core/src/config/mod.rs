//! Settings persistence
//!
//! ```ignore
//! use loopa_core::config::{default_conf_path, load_conf, save_conf};
//!
//! let conf = load_conf(&default_conf_path());
//! model.load(&conf);
//! // ...
//! model.store(&mut conf);
//! save_conf(&conf, &default_conf_path())?;
//! ```

mod conf;
mod io;
mod paths;

pub use conf::{default_conf_path, load_conf, save_conf, Conf, CONF_FILENAME};
pub use io::{load_config, read_config, save_config};
pub use paths::{config_dir, default_config_path};
