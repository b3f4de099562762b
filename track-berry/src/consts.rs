//! 通用常量.

/// 绘制用颜色 (RGB).
pub mod color {
    /// RGB 颜色.
    pub type Rgb = [u8; 3];

    /// 白色.
    pub const WHITE: Rgb = [255, 255, 255];

    /// 红色.
    pub const RED: Rgb = [255, 0, 0];

    /// 绿色.
    pub const GREEN: Rgb = [0, 255, 0];

    /// 蓝色.
    pub const BLUE: Rgb = [0, 0, 255];

    /// 品红.
    pub const MAGENTA: Rgb = [255, 0, 255];

    /// 黄色.
    pub const YELLOW: Rgb = [255, 255, 0];

    /// 青色.
    pub const CYAN: Rgb = [0, 255, 255];

    /// 暗绿色.
    pub const DARK_GREEN: Rgb = [0, 128, 0];

    /// 根节点 (轨迹起点).
    pub const ROOT: Rgb = MAGENTA;

    /// 中间节点.
    pub const INTERNAL: Rgb = DARK_GREEN;

    /// 叶节点 (轨迹终点).
    pub const LEAF: Rgb = BLUE;

    /// Demo 插件轮流使用的颜色.
    pub const DEMO_PALETTE: [Rgb; 7] = [WHITE, RED, GREEN, BLUE, MAGENTA, YELLOW, CYAN];
}

/// spot 绘制半径, 同时也是点击命中测试的方框半宽.
pub const SPOT_RADIUS: f64 = 4.0;

/// 选中 spot 的绘制半径相对 `SPOT_RADIUS` 的倍数.
pub const SELECTED_SCALE: f64 = 2.0;

/// 邻近平面上 spot ("幽灵") 的绘制半径倍数.
pub const GHOST_SCALE: f64 = 0.5;

/// 选中 spot 位于邻近平面时的绘制半径倍数.
pub const GHOST_SELECTED_SCALE: f64 = 1.0;

/// 准星 (十字) 半臂长的倍数.
pub const RETICLE_SCALE: f64 = 1.5;

/// 谱系关系标记 (小圆环) 的半径倍数.
pub const RELATION_SCALE: f64 = 0.5;

/// Demo 插件圆点的直径.
pub const DEMO_DIAMETER: f64 = 4.0;

/// Demo 插件每次点击散布的圆点个数.
pub const DEMO_DOTS: usize = 100;

/// 默认的幽灵 z 范围.
pub const GHOST_Z_RANGE: usize = 1;

/// 默认像素尺寸 (微米), `[x, y]`.
pub const PIXELS_UM: [f64; 2] = [0.1625, 0.1625];

/// 默认 z 步长 (微米).
pub const Z_STEP_UM: f64 = 0.5;

/// 默认帧间隔 (秒).
pub const FINTERVAL_SEC: f64 = 1.0;

/// 分块读取图像文件时的块大小.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// 默认空图像栈的高与宽.
pub const DEFAULT_PLANE_SHAPE: (usize, usize) = (256, 256);
