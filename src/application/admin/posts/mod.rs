mod commands;
mod queries;
mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use service::*;
pub use types::{
    AdminPostError, CreatePostCommand, CreatedPost, DeletePostCommand, DeletedPost,
    UpdatePostCommand,
};
