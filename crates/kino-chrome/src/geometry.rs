//! Sizing math for the player container and the time rail.
//!
//! Everything here is a pure function of measured sizes and configuration.
//! Inputs may be zero, negative or non-finite; outputs are always finite and
//! non-negative (fill margins excepted, which may go negative when the media
//! overflows its parent).

use crate::types::{Dimension, StretchingMode};

pub const MIN_ASPECT_RATIO: f64 = 0.01;
pub const MAX_ASPECT_RATIO: f64 = 100.0;

/// Finite and positive, else zero
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Keep `ratio` within `[0.01, 100]`, falling back to 1
pub fn clamp_aspect_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && (MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&ratio) {
        ratio
    } else {
        1.0
    }
}

/// `w/h` when the height is at least the width, `h/w` otherwise
pub fn orientation_ratio(width: f64, height: f64) -> f64 {
    if height >= width {
        width / height
    } else {
        height / width
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// How a `set_player_size` call will be carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingPlan {
    /// `setDimensions` is off
    Disabled,
    Literal,
    Fill,
    Responsive,
}

/// Resolve the stretching mode. `fill` only applies to video and `auto`
/// becomes responsive when the fluid heuristic fires.
pub fn plan_sizing(set_dimensions: bool, mode: StretchingMode, is_video: bool, fluid: bool) -> SizingPlan {
    if !set_dimensions {
        return SizingPlan::Disabled;
    }
    match mode {
        StretchingMode::Fill if is_video => SizingPlan::Fill,
        StretchingMode::Fill => SizingPlan::Literal,
        StretchingMode::Responsive => SizingPlan::Responsive,
        StretchingMode::Auto if fluid => SizingPlan::Responsive,
        StretchingMode::Auto | StretchingMode::None => SizingPlan::Literal,
    }
}

/// Fluid when either dimension is a percentage, or the node's max-width is
/// set to something other than `none` and its own width.
pub fn is_fluid(width: Dimension, height: Dimension, max_width: Option<&str>) -> bool {
    if width.is_percent() || height.is_percent() {
        return true;
    }
    match max_width.map(str::trim) {
        None | Some("") | Some("none") => false,
        Some(m) => Dimension::from_css(m) != Some(width),
    }
}

/// First forced value, then the node's inline style, then its attribute,
/// then the default
pub fn initial_dimension(
    forced: Option<Dimension>,
    style: Option<Dimension>,
    attribute: Option<Dimension>,
    default: f64,
) -> Dimension {
    forced
        .and_then(Dimension::normalized)
        .filter(Dimension::is_forced)
        .or(style)
        .or(attribute)
        .unwrap_or(Dimension::Px(default))
}

/// Inputs to the responsive calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponsiveInput {
    pub is_video: bool,
    pub width: Dimension,
    pub height: Dimension,
    /// Intrinsic video size reported by the renderer
    pub video_size: Option<(f64, f64)>,
    /// The node's `width`/`height` attributes
    pub attribute_size: (Option<f64>, Option<f64>),
    pub default_video: (f64, f64),
    pub default_audio: (f64, f64),
    pub initial_aspect_ratio: f64,
    /// Measured size of the nearest displayed ancestor
    pub parent: (f64, f64),
    /// Set when that ancestor is the document body
    pub viewport: Option<(f64, f64)>,
}

impl ResponsiveInput {
    fn native_size(&self) -> (f64, f64) {
        if !self.is_video {
            return self.default_audio;
        }
        let (intrinsic_w, intrinsic_h) = self.video_size.unwrap_or((0.0, 0.0));
        let pick = |intrinsic: f64, attribute: Option<f64>, default: f64| {
            if sanitize(intrinsic) > 0.0 {
                intrinsic
            } else {
                attribute.map(sanitize).filter(|v| *v > 0.0).unwrap_or(default)
            }
        };
        (
            pick(intrinsic_w, self.attribute_size.0, self.default_video.0),
            pick(intrinsic_h, self.attribute_size.1, self.default_video.1),
        )
    }

    /// Aspect ratio used for the height calculation
    pub fn aspect_ratio(&self) -> f64 {
        if !self.is_video {
            return clamp_aspect_ratio(self.initial_aspect_ratio);
        }
        let (w, h) = self.native_size();
        clamp_aspect_ratio(orientation_ratio(w, h))
    }
}

/// Responsive container size, or `None` if nothing positive can be computed
pub fn responsive_size(input: &ResponsiveInput) -> Option<Size> {
    let ratio = input.aspect_ratio();
    let (native_w, native_h) = input.native_size();
    let mut parent_w = sanitize(input.parent.0);
    let parent_h = sanitize(input.parent.1);

    let mut height = if input.is_video {
        if input.height == Dimension::Percent(100.0) {
            parent_h
        } else if native_h >= native_w {
            (parent_w / ratio).trunc()
        } else {
            (parent_w * ratio).trunc()
        }
    } else {
        native_h
    };

    if !height.is_finite() || height <= 0.0 {
        height = parent_h;
    }

    if let Some((vw, vh)) = input.viewport {
        parent_w = sanitize(vw);
        height = sanitize(vh);
    }

    let height = sanitize(height);
    (parent_w > 0.0 && height > 0.0).then(|| Size::new(parent_w, height))
}

/// Fill layout for the media element inside the outer container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillLayout {
    pub width: f64,
    pub height: f64,
    pub margin_left: f64,
}

/// Cover the parent while preserving `init`'s aspect ratio.
///
/// Scales on width unless scaling on height would overflow the parent's
/// width, in which case the height is matched and the overflow centered.
pub fn fill_layout(init: Size, parent: Size) -> FillLayout {
    let parent_w = sanitize(parent.width);
    let parent_h = sanitize(parent.height);
    let (init_w, init_h) = match (sanitize(init.width), sanitize(init.height)) {
        (w, h) if w > 0.0 && h > 0.0 => (w, h),
        _ => (parent_w, parent_h),
    };
    if init_w <= 0.0 || init_h <= 0.0 {
        return FillLayout {
            width: 0.0,
            height: 0.0,
            margin_left: 0.0,
        };
    }

    let scale_x1 = parent_w;
    let scale_y1 = init_h * parent_w / init_w;
    let scale_x2 = init_w * parent_h / init_h;
    let scale_y2 = parent_h;
    let scale_on_width = !(scale_x2 > parent_w);

    let final_w = if scale_on_width { scale_x1 } else { scale_x2 }.floor();
    let final_h = if scale_on_width { scale_y1 } else { scale_y2 }.floor();

    FillLayout {
        width: if scale_on_width { parent_w } else { final_w },
        height: if scale_on_width { final_h } else { parent_h },
        margin_left: ((parent_w - final_w) / 2.0).floor(),
    }
}

/// Width left for the time rail. Never negative.
pub fn rail_width(controls_width: f64, sibling_widths: &[f64], rail_margin: f64, total_margin: f64) -> f64 {
    let siblings: f64 = sibling_widths.iter().copied().map(sanitize).sum();
    let margin = |m: f64| if m.is_finite() { m } else { 0.0 };
    sanitize(sanitize(controls_width) - siblings - margin(rail_margin) - margin(total_margin) - 1.0)
}
