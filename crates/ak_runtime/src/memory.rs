// crates/ak_runtime/src/memory.rs

//! 对齐字段缓冲区与内存预算
//!
//! 提供固定长度、缓存行对齐的波场缓冲区 `AlignedField`，
//! 以及运行前内存预算检查 `MemoryBudget`。
//!
//! 字段缓冲区在时间循环开始前一次性分配，循环内只做指针轮换，
//! 因此不提供 push/grow 等动态扩容接口。

use bytemuck::Pod;
use rayon::prelude::*;
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

/// 资源错误
///
/// 分配前检测，绝不在时间循环中途出现。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// 超出内存预算
    #[error("allocation of {requested_bytes} bytes exceeds budget of {budget_bytes} bytes")]
    BudgetExceeded {
        /// 请求字节数
        requested_bytes: u64,
        /// 预算字节数
        budget_bytes: u64,
    },

    /// 字节数溢出（节点数 × 变量数 × 字节数超出 u64）
    #[error("allocation size overflow: {nodes} nodes x {vars_per_node} vars")]
    SizeOverflow {
        /// 节点数
        nodes: usize,
        /// 每节点变量数
        vars_per_node: usize,
    },

    /// 节点总数溢出（轴向节点数乘积超出 usize）
    #[error("grid node count overflow: {nx} x {ny} x {nz} nodes")]
    NodeCountOverflow {
        /// x 轴节点数（溢出时饱和）
        nx: usize,
        /// y 轴节点数（溢出时饱和）
        ny: usize,
        /// z 轴节点数（溢出时饱和）
        nz: usize,
    },
}

/// 内存预算
///
/// `None` 表示无限制。检查是纯查询，不分配任何内存。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryBudget {
    limit_bytes: Option<u64>,
}

impl MemoryBudget {
    /// 无限制预算
    pub const UNLIMITED: Self = Self { limit_bytes: None };

    /// 创建有限预算
    pub fn bytes(limit: u64) -> Self {
        Self {
            limit_bytes: Some(limit),
        }
    }

    /// 预算上限（字节）
    pub fn limit(&self) -> Option<u64> {
        self.limit_bytes
    }

    /// 检查请求是否在预算内
    pub fn check(&self, requested_bytes: u64) -> Result<(), ResourceError> {
        match self.limit_bytes {
            Some(budget) if requested_bytes > budget => Err(ResourceError::BudgetExceeded {
                requested_bytes,
                budget_bytes: budget,
            }),
            _ => Ok(()),
        }
    }
}

/// 对齐要求
pub trait Alignment: 'static {
    /// 请求的字节对齐
    const ALIGN: usize;
}

/// CPU 对齐（64 字节缓存行 / AVX-512）
#[derive(Debug, Clone, Copy)]
pub struct CpuAlign;
impl Alignment for CpuAlign {
    const ALIGN: usize = 64;
}

/// 默认对齐（8 字节）
#[derive(Debug, Clone, Copy)]
pub struct DefaultAlign;
impl Alignment for DefaultAlign {
    const ALIGN: usize = 8;
}

/// 固定长度对齐字段缓冲区
///
/// 零初始化，长度在构造后不可变。
#[derive(Debug)]
pub struct AlignedField<T: Pod + Default, A: Alignment = CpuAlign> {
    ptr: *mut T,
    len: usize,
    _align: PhantomData<A>,
}

unsafe impl<T: Pod + Default + Send, A: Alignment> Send for AlignedField<T, A> {}
unsafe impl<T: Pod + Default + Sync, A: Alignment> Sync for AlignedField<T, A> {}

impl<T: Pod + Default, A: Alignment> AlignedField<T, A> {
    /// 创建零初始化缓冲区
    pub fn zeros(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: std::ptr::null_mut(),
                len: 0,
                _align: PhantomData,
            };
        }

        let layout = Self::layout_for(len);
        let ptr = unsafe { alloc_zeroed(layout) as *mut T };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }

        debug_assert_eq!((ptr as usize) % layout.align(), 0, "alignment guarantee violated");

        Self {
            ptr,
            len,
            _align: PhantomData,
        }
    }

    /// 长度
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 缓冲区字节数
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// 只读切片视图
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        if self.len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    /// 可变切片视图
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.len == 0 {
            &mut []
        } else {
            unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
        }
    }

    /// 并行只读迭代器
    pub fn par_iter(&self) -> rayon::slice::Iter<'_, T>
    where
        T: Sync,
    {
        self.as_slice().par_iter()
    }

    /// 并行可变迭代器
    pub fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, T>
    where
        T: Send + Sync,
    {
        self.as_mut_slice().par_iter_mut()
    }

    /// 并行填充
    pub fn par_fill(&mut self, value: T)
    where
        T: Copy + Send + Sync,
    {
        self.as_mut_slice().par_iter_mut().for_each(|v| *v = value);
    }

    #[inline]
    fn layout_for(len: usize) -> Layout {
        Layout::from_size_align(
            len * std::mem::size_of::<T>(),
            A::ALIGN.max(std::mem::align_of::<T>()),
        )
        .expect("invalid layout")
    }
}

impl<T: Pod + Default, A: Alignment> Deref for AlignedField<T, A> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T: Pod + Default, A: Alignment> DerefMut for AlignedField<T, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T: Pod + Default, A: Alignment> Clone for AlignedField<T, A> {
    fn clone(&self) -> Self {
        let mut out = Self::zeros(self.len);
        out.as_mut_slice().copy_from_slice(self.as_slice());
        out
    }
}

impl<T: Pod + Default, A: Alignment> Drop for AlignedField<T, A> {
    fn drop(&mut self) {
        if self.ptr.is_null() || self.len == 0 {
            return;
        }
        let layout = Self::layout_for(self.len);
        unsafe { dealloc(self.ptr as *mut u8, layout) };
    }
}

/// 计算状态总字节数（节点数 × 每节点变量数 × 每变量字节数）
///
/// 溢出时返回 `ResourceError::SizeOverflow`。
pub fn state_bytes(
    nodes: usize,
    vars_per_node: usize,
    bytes_per_var: usize,
) -> Result<u64, ResourceError> {
    (nodes as u64)
        .checked_mul(vars_per_node as u64)
        .and_then(|b| b.checked_mul(bytes_per_var as u64))
        .ok_or(ResourceError::SizeOverflow {
            nodes,
            vars_per_node,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_field_basic() {
        let mut field: AlignedField<f64, CpuAlign> = AlignedField::zeros(10);
        assert_eq!(field.len(), 10);
        assert!(field.iter().all(|&v| v == 0.0));
        field[3] = 1.5;
        assert!((field[3] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_aligned_field_alignment() {
        let field: AlignedField<f64, CpuAlign> = AlignedField::zeros(100);
        assert_eq!((field.as_slice().as_ptr() as usize) % 64, 0);
    }

    #[test]
    fn test_aligned_field_clone() {
        let mut a: AlignedField<f64> = AlignedField::zeros(5);
        a[0] = 3.25;
        let b = a.clone();
        assert_eq!(b.len(), 5);
        assert!((b[0] - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_aligned_field_empty() {
        let field: AlignedField<f64> = AlignedField::zeros(0);
        assert!(field.is_empty());
        assert_eq!(field.byte_len(), 0);
    }

    #[test]
    fn test_par_fill() {
        let mut field: AlignedField<f64> = AlignedField::zeros(1000);
        field.par_fill(2.0);
        assert!(field.iter().all(|&v| (v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_budget_check() {
        let budget = MemoryBudget::bytes(1024);
        assert!(budget.check(1024).is_ok());
        assert!(matches!(
            budget.check(1025),
            Err(ResourceError::BudgetExceeded { .. })
        ));
        assert!(MemoryBudget::UNLIMITED.check(u64::MAX).is_ok());
    }

    #[test]
    fn test_state_bytes() {
        assert_eq!(state_bytes(100, 2, 8).unwrap(), 1600);
        assert!(matches!(
            state_bytes(usize::MAX, 8, 8),
            Err(ResourceError::SizeOverflow { .. })
        ));
    }
}
