// crates/ak_physics/src/mask.rs

//! 域掩码
//!
//! 把网格节点分为内部 / 边界 / 外部三类，并为每个边界节点
//! 预计算向内镜像节点。构建一次、整个运行期只读。
//!
//! 分类规则：
//! - 纯盒体：按索引分类——任一轴索引落在 0 或 N-1 的节点为边界，
//!   其余为内部，没有外部节点（幽灵层就是边界层）。
//! - 盒体+穹顶：按到复合表面的符号距离分类——|sdf| < dx 为边界
//!   （sdf == 0 归入边界），sdf > 0 为外部，其余为内部。
//!
//! 复合 sdf 取盒体与半球的逐点最小值，是 1-Lipschitz 连续函数：
//! 相邻节点的 sdf 差不超过 dx，因此内部节点不可能与外部节点相邻，
//! 边界壳永远闭合。

use ak_config::{Dimensionality, SimulationConfig};
use ak_runtime::NodeIndex;
use glam::DVec3;
use rayon::prelude::*;

use crate::grid::Grid;

/// 节点分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeTag {
    /// 内部节点，参与模板更新
    Interior,
    /// 边界节点，由边界模型写入
    Boundary,
    /// 外部节点，不参与任何计算，保持为零
    Exterior,
}

/// 边界节点及其预计算的向内镜像
#[derive(Debug, Clone, Copy)]
pub struct BoundaryNode {
    /// 边界节点索引
    pub node: NodeIndex,
    /// 镜像节点索引（最靠内的轴向邻居）
    pub mirror: NodeIndex,
}

/// 房间几何
///
/// 矩形盒以原点为角点；可选穹顶为半球（二维为半圆），
/// 圆心位于盒体垂直轴顶面中心。
#[derive(Debug, Clone)]
pub struct RoomGeometry {
    dimensionality: Dimensionality,
    lx: f64,
    ly: f64,
    lz: f64,
    dome_radius: Option<f64>,
}

impl RoomGeometry {
    /// 从配置构建
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            dimensionality: config.dimensionality,
            lx: config.room.lx,
            ly: config.room.ly,
            lz: config.room.lz.unwrap_or(0.0),
            dome_radius: config.room.dome_radius,
        }
    }

    /// 是否带穹顶
    pub fn has_dome(&self) -> bool {
        self.dome_radius.is_some()
    }

    /// 到复合表面的符号距离（内负外正）
    ///
    /// 盒体与半球的并集取逐点最小值；半球本身是球面与
    /// 顶面以上半空间的交集（逐点最大值）。
    pub fn sdf(&self, p: DVec3) -> f64 {
        let box_d = match self.dimensionality {
            Dimensionality::TwoD => sd_box2(p.x, p.y, self.lx, self.ly),
            Dimensionality::ThreeD => sd_box3(p, DVec3::new(self.lx, self.ly, self.lz)),
        };

        match self.dome_radius {
            None => box_d,
            Some(r) => {
                let dome_d = match self.dimensionality {
                    Dimensionality::TwoD => {
                        let cx = self.lx / 2.0;
                        let dist = ((p.x - cx).powi(2) + (p.y - self.ly).powi(2)).sqrt();
                        (dist - r).max(self.ly - p.y)
                    }
                    Dimensionality::ThreeD => {
                        let center = DVec3::new(self.lx / 2.0, self.ly / 2.0, self.lz);
                        ((p - center).length() - r).max(self.lz - p.z)
                    }
                };
                box_d.min(dome_d)
            }
        }
    }
}

/// 轴对齐盒 [0,lx]×[0,ly] 的符号距离
fn sd_box2(px: f64, py: f64, lx: f64, ly: f64) -> f64 {
    let qx = (px - lx / 2.0).abs() - lx / 2.0;
    let qy = (py - ly / 2.0).abs() - ly / 2.0;
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    outside + qx.max(qy).min(0.0)
}

/// 轴对齐盒 [0,l.x]×[0,l.y]×[0,l.z] 的符号距离
fn sd_box3(p: DVec3, l: DVec3) -> f64 {
    let q = (p - l / 2.0).abs() - l / 2.0;
    let outside = q.max(DVec3::ZERO).length();
    outside + q.x.max(q.y).max(q.z).min(0.0)
}

/// 域掩码
///
/// 每个节点一个分类标签，外加边界节点的镜像表。
/// 同一 (Grid, RoomGeometry) 输入总是产出相同掩码。
#[derive(Debug, Clone)]
pub struct DomainMask {
    tags: Vec<NodeTag>,
    boundary: Vec<BoundaryNode>,
    n_interior: usize,
}

impl DomainMask {
    /// 构建掩码
    pub fn build(grid: &Grid, geometry: &RoomGeometry) -> Self {
        let tags: Vec<NodeTag> = if geometry.has_dome() {
            (0..grid.n_nodes())
                .into_par_iter()
                .map(|n| {
                    let (i, j, k) = grid.coords(n);
                    classify_sdf(geometry.sdf(grid.position(i, j, k)), grid.dx)
                })
                .collect()
        } else {
            (0..grid.n_nodes())
                .into_par_iter()
                .map(|n| classify_box(grid, grid.coords(n)))
                .collect()
        };

        let mut boundary = Vec::new();
        let mut n_interior = 0;
        for (n, &tag) in tags.iter().enumerate() {
            match tag {
                NodeTag::Interior => n_interior += 1,
                NodeTag::Boundary => boundary.push(BoundaryNode {
                    node: NodeIndex::new(n),
                    mirror: NodeIndex::new(find_mirror(grid, geometry, &tags, n)),
                }),
                NodeTag::Exterior => {}
            }
        }

        Self {
            tags,
            boundary,
            n_interior,
        }
    }

    /// 节点分类
    #[inline]
    pub fn tag(&self, n: usize) -> NodeTag {
        self.tags[n]
    }

    /// 分类标签切片（供模板更新按节点查询）
    #[inline]
    pub fn tags(&self) -> &[NodeTag] {
        &self.tags
    }

    /// 边界节点表
    pub fn boundary_nodes(&self) -> &[BoundaryNode] {
        &self.boundary
    }

    /// 内部节点数
    pub fn n_interior(&self) -> usize {
        self.n_interior
    }

    /// 边界节点数
    pub fn n_boundary(&self) -> usize {
        self.boundary.len()
    }
}

/// 按索引分类（纯盒体）
fn classify_box(grid: &Grid, (i, j, k): (usize, usize, usize)) -> NodeTag {
    let edge = |idx: usize, n: usize| idx == 0 || idx == n - 1;
    let on_edge = match grid.dimensionality {
        Dimensionality::TwoD => edge(i, grid.nx) || edge(j, grid.ny),
        Dimensionality::ThreeD => edge(i, grid.nx) || edge(j, grid.ny) || edge(k, grid.nz),
    };
    if on_edge {
        NodeTag::Boundary
    } else {
        NodeTag::Interior
    }
}

/// 按符号距离分类（盒体+穹顶）
#[inline]
fn classify_sdf(d: f64, dx: f64) -> NodeTag {
    if d.abs() < dx {
        NodeTag::Boundary
    } else if d > 0.0 {
        NodeTag::Exterior
    } else {
        NodeTag::Interior
    }
}

/// 为边界节点找向内镜像
///
/// 纯盒体：各轴索引夹到 [1, N-2]（角点沿对角线收缩）。
/// 带穹顶：取 sdf 最小（最靠内）的在格轴向邻居，按固定轴序
/// (x-, x+, y-, y+, z-, z+) 决胜，保证确定性。
/// 孤立节点（无更靠内邻居）退化为自身。
fn find_mirror(grid: &Grid, geometry: &RoomGeometry, tags: &[NodeTag], n: usize) -> usize {
    let (i, j, k) = grid.coords(n);

    if !geometry.has_dome() {
        let clamp = |idx: usize, n: usize| idx.clamp(1, n - 2);
        let kk = match grid.dimensionality {
            Dimensionality::TwoD => 0,
            Dimensionality::ThreeD => clamp(k, grid.nz),
        };
        return grid.index(clamp(i, grid.nx), clamp(j, grid.ny), kk);
    }

    let mut candidates: Vec<(usize, usize, usize)> = Vec::with_capacity(6);
    if i > 0 {
        candidates.push((i - 1, j, k));
    }
    if i + 1 < grid.nx {
        candidates.push((i + 1, j, k));
    }
    if j > 0 {
        candidates.push((i, j - 1, k));
    }
    if j + 1 < grid.ny {
        candidates.push((i, j + 1, k));
    }
    if grid.dimensionality == Dimensionality::ThreeD {
        if k > 0 {
            candidates.push((i, j, k - 1));
        }
        if k + 1 < grid.nz {
            candidates.push((i, j, k + 1));
        }
    }

    let mut best = n;
    let mut best_d = geometry.sdf(grid.position(i, j, k));
    for (ci, cj, ck) in candidates {
        let m = grid.index(ci, cj, ck);
        if tags[m] == NodeTag::Exterior {
            continue;
        }
        let d = geometry.sdf(grid.position(ci, cj, ck));
        // 严格小于：同距离时保留先遇到的候选（固定轴序）
        if d < best_d {
            best_d = d;
            best = m;
        }
    }
    best
}
