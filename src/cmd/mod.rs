//! CLI command implementations.
//!
//! | Module   | Commands handled                 |
//! |----------|----------------------------------|
//! | `serve`  | `Serve`                          |
//! | `init`   | `Init`                           |
//! | `board`  | `Board add`, `Board list`, `Repair` |
//! | `show`   | `Show`                           |
//! | `watch`  | `Watch`                          |
//! | `config` | `Config`                         |

pub mod board;
pub mod config;
pub mod init;
pub mod serve;
pub mod show;
pub mod watch;

pub use board::{cmd_board_add, cmd_board_list, cmd_repair};
pub use config::cmd_config;
pub use init::cmd_init;
pub use serve::cmd_serve;
pub use show::cmd_show;
pub use watch::cmd_watch;
