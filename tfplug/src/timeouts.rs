//! Per-operation default timeouts
//!
//! A resource declares how long each operation may take when the caller has
//! not set its own deadline on the [`Context`].

use crate::context::Context;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn minutes(create: u64, read: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            read: Duration::from_secs(read * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    pub fn create_context(&self, ctx: &Context) -> Context {
        ctx.with_default_timeout(self.create)
    }

    pub fn read_context(&self, ctx: &Context) -> Context {
        ctx.with_default_timeout(self.read)
    }

    pub fn update_context(&self, ctx: &Context) -> Context {
        ctx.with_default_timeout(self.update)
    }

    pub fn delete_context(&self, ctx: &Context) -> Context {
        ctx.with_default_timeout(self.delete)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::minutes(20, 5, 20, 20)
    }
}
