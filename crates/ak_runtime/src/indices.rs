// crates/ak_runtime/src/indices.rs

//! 类型安全索引
//!
//! 提供网格节点与接收点的强类型索引，编译期防止混用，
//! 运行时与 `usize` 完全相同（`repr(transparent)`）。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 无效索引标记
pub const INVALID_INDEX: usize = usize::MAX;

macro_rules! define_index {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub usize);

        impl $name {
            /// 无效索引常量
            pub const INVALID: Self = Self(INVALID_INDEX);

            /// 创建新索引
            #[inline]
            pub const fn new(idx: usize) -> Self {
                Self(idx)
            }

            /// 获取索引值
            #[inline]
            pub const fn get(self) -> usize {
                self.0
            }

            /// 检查是否有效
            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != INVALID_INDEX
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(idx: usize) -> Self {
                Self::new(idx)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(idx: $name) -> usize {
                idx.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}(INVALID)", stringify!($name))
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}", self.0)
                } else {
                    write!(f, "INVALID")
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

define_index!(NodeIndex, "网格节点索引（展平的 x-major 线性索引）");
define_index!(ReceiverIndex, "接收点索引");

/// 创建节点索引
#[inline]
pub const fn node(idx: usize) -> NodeIndex {
    NodeIndex::new(idx)
}

/// 创建接收点索引
#[inline]
pub const fn receiver(idx: usize) -> ReceiverIndex {
    ReceiverIndex::new(idx)
}
