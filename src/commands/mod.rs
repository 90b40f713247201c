pub mod check;
pub mod general;
pub mod permissions;

pub use check::permission_check;
pub use general::{help, ping};
pub use permissions::{
    channel_command, channel_module, channel_perms, permrole, role_command, role_module,
    role_perms, server_command, server_module, server_perms, user_command, user_module,
    user_perms, verbose,
};

use crate::{Data, Error};

/// Every command the bot registers
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        ping(),
        help(),
        permrole(),
        verbose(),
        server_module(),
        server_command(),
        channel_module(),
        channel_command(),
        role_module(),
        role_command(),
        user_module(),
        user_command(),
        server_perms(),
        channel_perms(),
        role_perms(),
        user_perms(),
    ]
}
