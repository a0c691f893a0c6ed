// crates/ak_physics/src/grid.rs

//! 网格规划
//!
//! 从物理参数推导离散化网格：
//! - 网格间距 dx = c / (fmax * ppw)，即最短解析波长的 1/ppw
//! - 时间步长 dt = dx * sqrt(1/D) / c，取显式格式的 CFL 稳定性极限
//! - 每轴节点数 N = ceil(extent / dx) + 2（每侧各一层幽灵节点）
//! - 步数 Nt = ceil(duration / dt)
//!
//! 带穹顶时垂直轴的包络范围加上穹顶半径，保证半球完整落在网格内。
//! 所有推导是纯函数，不触发任何分配。

use ak_config::{ConfigError, Dimensionality, SimulationConfig};
use ak_runtime::ResourceError;
use glam::DVec3;

/// 离散化网格
///
/// 节点 (i, j, k) 的物理坐标为 ((i-1)*dx, (j-1)*dx, (k-1)*dx)，
/// 即内侧第一层节点落在盒体表面上，幽灵层在表面外一格。
/// 二维时 nz == 1 且 k 恒为 0。
#[derive(Debug, Clone)]
pub struct Grid {
    /// 空间维度
    pub dimensionality: Dimensionality,
    /// x 轴节点数（含幽灵层）
    pub nx: usize,
    /// y 轴节点数（含幽灵层）
    pub ny: usize,
    /// z 轴节点数（二维时为 1）
    pub nz: usize,
    /// 网格间距 [m]（各轴一致）
    pub dx: f64,
    /// 时间步长 [s]
    pub dt: f64,
    /// 时间步数
    pub nt: usize,
}

impl Grid {
    /// 节点总数（乘积不溢出由 [`GridPlanner::plan`] 保证）
    pub fn n_nodes(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// (i, j, k) 到扁平索引
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.ny + j) * self.nx + i
    }

    /// 扁平索引到 (i, j, k)
    #[inline]
    pub fn coords(&self, n: usize) -> (usize, usize, usize) {
        let i = n % self.nx;
        let j = (n / self.nx) % self.ny;
        let k = n / (self.nx * self.ny);
        (i, j, k)
    }

    /// 节点物理坐标 [m]
    #[inline]
    pub fn position(&self, i: usize, j: usize, k: usize) -> DVec3 {
        DVec3::new(
            (i as f64 - 1.0) * self.dx,
            (j as f64 - 1.0) * self.dx,
            (k as f64 - 1.0) * self.dx,
        )
    }

    /// 物理坐标到最近节点 (i, j, k)
    ///
    /// 越界时返回 None。二维时忽略 z 分量。
    pub fn nearest_node(&self, p: DVec3) -> Option<(usize, usize, usize)> {
        let snap = |coord: f64, n: usize| -> Option<usize> {
            let idx = (coord / self.dx).round() + 1.0;
            if idx < 0.0 || idx >= n as f64 {
                None
            } else {
                Some(idx as usize)
            }
        };
        let i = snap(p.x, self.nx)?;
        let j = snap(p.y, self.ny)?;
        let k = match self.dimensionality {
            Dimensionality::TwoD => 0,
            Dimensionality::ThreeD => snap(p.z, self.nz)?,
        };
        Some((i, j, k))
    }

    /// 接收点采样率 [Hz]（每时间步一个样本）
    pub fn sample_rate(&self) -> f64 {
        1.0 / self.dt
    }
}

/// 网格规划器
///
/// 从验证过的配置推导 [`Grid`]，并提供分配前的内存估算查询。
#[derive(Debug, Clone)]
pub struct GridPlanner {
    dimensionality: Dimensionality,
    speed_of_sound: f64,
    fmax: f64,
    ppw: f64,
    duration: f64,
    lx: f64,
    ly: f64,
    lz: Option<f64>,
    dome_radius: Option<f64>,
}

impl GridPlanner {
    /// 从配置构建规划器
    ///
    /// 在此重跑配置验证，保证后续推导不会遇到非正参数。
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            dimensionality: config.dimensionality,
            speed_of_sound: config.medium.speed_of_sound,
            fmax: config.resolution.fmax,
            ppw: config.resolution.ppw,
            duration: config.resolution.duration,
            lx: config.room.lx,
            ly: config.room.ly,
            lz: config.room.lz,
            dome_radius: config.room.dome_radius,
        })
    }

    /// 网格间距 dx = c / (fmax * ppw)
    pub fn dx(&self) -> f64 {
        self.speed_of_sound / (self.fmax * self.ppw)
    }

    /// Courant 数 λ = c * dt / dx = sqrt(1/D)
    ///
    /// 取 D 维显式格式的稳定性极限，模板系数 λ² 恰为 1/D。
    pub fn courant(&self) -> f64 {
        (1.0 / self.dimensionality.ndim() as f64).sqrt()
    }

    /// 时间步长 dt = dx * sqrt(1/D) / c
    pub fn dt(&self) -> f64 {
        self.dx() * self.courant() / self.speed_of_sound
    }

    /// 推导网格
    ///
    /// 轴向节点数的乘积超出 `usize` 可寻址范围时返回
    /// [`ResourceError::NodeCountOverflow`]，后续各处的
    /// `n_nodes()` 因此总是安全的。
    pub fn plan(&self) -> Result<Grid, ResourceError> {
        let dx = self.dx();
        let dome = self.dome_radius.unwrap_or(0.0);

        // 穹顶架在垂直轴顶面上，包络范围加一个半径
        let (ex, ey, ez) = match self.dimensionality {
            Dimensionality::TwoD => (self.lx, self.ly + dome, 0.0),
            Dimensionality::ThreeD => (self.lx, self.ly, self.lz.unwrap_or(0.0) + dome),
        };

        // 单轴超出范围时饱和，由下面的乘积检查统一拒绝
        let axis_nodes = |extent: f64| {
            let n = (extent / dx).ceil();
            if n >= (usize::MAX - 2) as f64 {
                usize::MAX
            } else {
                n as usize + 2
            }
        };

        let (nx, ny, nz) = match self.dimensionality {
            Dimensionality::TwoD => (axis_nodes(ex), axis_nodes(ey), 1),
            Dimensionality::ThreeD => (axis_nodes(ex), axis_nodes(ey), axis_nodes(ez)),
        };

        if nx == usize::MAX
            || ny == usize::MAX
            || nz == usize::MAX
            || nx.checked_mul(ny).and_then(|p| p.checked_mul(nz)).is_none()
        {
            return Err(ResourceError::NodeCountOverflow { nx, ny, nz });
        }

        Ok(Grid {
            dimensionality: self.dimensionality,
            nx,
            ny,
            nz,
            dx,
            dt: self.dt(),
            nt: (self.duration / self.dt()).ceil() as usize,
        })
    }

    /// 估算状态内存 [字节]（节点数 × 每节点变量数 × 每变量字节数）
    ///
    /// 纯查询，不分配。溢出时返回 [`ak_runtime::ResourceError::SizeOverflow`]。
    pub fn estimated_state_bytes(
        &self,
        grid: &Grid,
        vars_per_node: usize,
        bytes_per_var: usize,
    ) -> Result<u64, ak_runtime::ResourceError> {
        ak_runtime::state_bytes(grid.n_nodes(), vars_per_node, bytes_per_var)
    }

    /// 网格点密度 [点/m³]：(ppw/2)³ * (2*fmax/c)³
    ///
    /// 即空间采样率（2*fmax/c 为最短波长的奈奎斯特率，乘 ppw/2 超采样）
    /// 的三次方。
    pub fn point_density(&self) -> f64 {
        let rate = (self.ppw / 2.0) * (2.0 * self.fmax / self.speed_of_sound);
        rate.powi(3)
    }

    /// 存储密度 [字节/m³]
    pub fn storage_density(&self, bytes_per_point: f64) -> f64 {
        self.point_density() * bytes_per_point
    }
}
