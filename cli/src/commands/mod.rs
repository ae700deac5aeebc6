mod expense;
mod helpers;
mod slot;
mod summary;
mod transfer;

pub(crate) use expense::{cmd_clear, cmd_delete, cmd_list, cmd_update};
pub(crate) use slot::{cmd_day, cmd_entry, cmd_remove, cmd_set};
pub(crate) use summary::{cmd_month, cmd_report};
pub(crate) use transfer::{cmd_export, cmd_import};
