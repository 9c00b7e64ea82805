//! Exclusive ownership of one pooled device buffer.

use crate::error::Result;
use crate::gpu::device::{BufferId, RawBuffer};
use crate::kernels::names;
use crate::runtime::context::Context;
use crate::runtime::launch::KernelArg;

/// A device buffer of `len` floats on loan from a context's pool.
///
/// Dropping it puts the buffer back on the pool's free list. The pool may
/// hand out a buffer longer than requested (power-of-two bucketing), so
/// `len` and not the allocation size is what operations work on.
pub struct PooledBuffer<'ctx> {
    ctx: &'ctx Context,
    raw: Option<RawBuffer>,
    len: usize,
}

impl<'ctx> PooledBuffer<'ctx> {
    /// Take a buffer for `len` floats from the pool.
    pub(crate) fn acquire(ctx: &'ctx Context, len: usize) -> Result<Self> {
        let raw = ctx.acquire(len)?;
        Ok(Self {
            ctx,
            raw: Some(raw),
            len,
        })
    }

    fn raw(&self) -> &RawBuffer {
        match &self.raw {
            Some(raw) => raw,
            None => unreachable!("pooled buffer used after release"),
        }
    }

    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    pub fn id(&self) -> BufferId {
        self.raw().id()
    }

    /// Number of floats this buffer holds for its owner.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bind this buffer as a kernel argument.
    pub fn arg(&self) -> KernelArg {
        KernelArg::buffer(self.id())
    }

    pub(crate) fn write(&mut self, data: &[f32]) -> Result<()> {
        self.ctx.write(self.raw(), data)
    }

    pub(crate) fn read(&self) -> Result<Vec<f32>> {
        let mut out = vec![0.0; self.len];
        self.ctx.read(self.raw(), &mut out)?;
        Ok(out)
    }

    /// A new buffer of the same length with the same contents.
    pub(crate) fn try_clone(&self) -> Result<Self> {
        let copy = Self::acquire(self.ctx, self.len)?;
        self.ctx.copy(self.raw(), copy.raw(), self.len)?;
        Ok(copy)
    }

    /// Overwrite this buffer with `source` using the copy kernel.
    /// Lengths must already agree.
    pub(crate) fn copy_from(&mut self, source: &PooledBuffer<'ctx>) -> Result<()> {
        self.ctx.launch(
            names::VCOPY,
            &[self.len],
            &[source.arg(), self.arg(), KernelArg::count(self.len)?],
        )
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.ctx.release(raw);
        }
    }
}

impl std::fmt::Debug for PooledBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("id", &self.raw.as_ref().map(RawBuffer::id))
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_returns_to_pool() {
        let ctx = Context::host().unwrap();
        let id = {
            let buf = PooledBuffer::acquire(&ctx, 8).unwrap();
            assert_eq!(ctx.pool_stats().owned, 1);
            buf.id()
        };
        let stats = ctx.pool_stats();
        assert_eq!(stats.owned, 0);
        assert_eq!(stats.free, 1);

        let again = PooledBuffer::acquire(&ctx, 8).unwrap();
        assert_eq!(again.id(), id);
    }

    #[test]
    fn test_move_keeps_single_owner() {
        let ctx = Context::host().unwrap();
        let buf = PooledBuffer::acquire(&ctx, 4).unwrap();
        let moved = buf;
        assert_eq!(ctx.pool_stats().owned, 1);
        drop(moved);
        assert_eq!(ctx.pool_stats().owned, 0);
        assert_eq!(ctx.pool_stats().free, 1);
    }

    #[test]
    fn test_clone_and_copy_from() {
        let ctx = Context::host().unwrap();
        let mut a = PooledBuffer::acquire(&ctx, 3).unwrap();
        a.write(&[1.0, 2.0, 3.0]).unwrap();

        let b = a.try_clone().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(b.read().unwrap(), vec![1.0, 2.0, 3.0]);

        let mut c = PooledBuffer::acquire(&ctx, 3).unwrap();
        c.copy_from(&a).unwrap();
        assert_eq!(c.read().unwrap(), vec![1.0, 2.0, 3.0]);
    }
}
