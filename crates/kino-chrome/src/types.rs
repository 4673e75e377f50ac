//! Core types for Kino Chrome

use serde::{Deserialize, Serialize};

use crate::dom::NodeId;
use crate::{Error, Result};

/// Unique identifier for a player instance, rendered as `mep_<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mep_{}", self.0)
    }
}

/// A CSS length as the player understands it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DimensionRepr", into = "String")]
pub enum Dimension {
    /// Pixel length
    Px(f64),
    /// Percentage of the parent
    Percent(f64),
    /// Unconstrained (`auto`)
    Auto,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DimensionRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<DimensionRepr> for Dimension {
    type Error = Error;

    fn try_from(repr: DimensionRepr) -> Result<Self> {
        match repr {
            DimensionRepr::Number(n) if n.is_finite() => Ok(Dimension::Px(clamp_length(n))),
            DimensionRepr::Number(n) => Err(Error::InvalidDimension(n.to_string())),
            // non-finite text such as "NaN%" falls back to auto
            DimensionRepr::Text(s) => match Dimension::parse(&s) {
                Err(_) if is_non_finite(&s) => Ok(Dimension::Auto),
                other => other,
            },
        }
    }
}

impl From<Dimension> for String {
    fn from(d: Dimension) -> Self {
        d.to_css()
    }
}

/// Finite, non-negative length; anything else collapses to zero
fn clamp_length(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

fn is_non_finite(s: &str) -> bool {
    let s = s.trim();
    let number = s.strip_suffix('%').or_else(|| s.strip_suffix("px")).unwrap_or(s);
    number.trim().parse::<f64>().is_ok_and(|v| !v.is_finite())
}

fn parse_length(s: &str, original: &str) -> Result<f64> {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(clamp_length(v)),
        _ => Err(Error::InvalidDimension(original.to_string())),
    }
}

impl Dimension {
    /// Parse `"640"`, `"640px"`, `"100%"` or `"auto"`.
    /// Negative lengths clamp to zero; `NaN` and infinities are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            return Ok(Dimension::Auto);
        }
        if let Some(pct) = s.strip_suffix('%') {
            return parse_length(pct, s).map(Dimension::Percent);
        }
        let number = s.strip_suffix("px").unwrap_or(s);
        parse_length(number, s).map(Dimension::Px)
    }

    /// Lenient parse of an inline style value; unknown units become `None`
    pub fn from_css(s: &str) -> Option<Self> {
        match Dimension::parse(s) {
            Ok(Dimension::Auto) => None,
            Ok(d) => Some(d),
            Err(_) => None,
        }
    }

    /// Pixel value, if this is a pixel length
    pub fn as_px(&self) -> Option<f64> {
        match self {
            Dimension::Px(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn is_percent(&self) -> bool {
        matches!(self, Dimension::Percent(_))
    }

    /// A forced dimension is a positive pixel length or any percentage
    pub fn is_forced(&self) -> bool {
        match self {
            Dimension::Px(v) => *v > 0.0,
            Dimension::Percent(p) => p.is_finite(),
            Dimension::Auto => false,
        }
    }

    /// Clamped copy, or `None` when the length is not finite
    pub fn normalized(self) -> Option<Self> {
        match self {
            Dimension::Px(v) if v.is_finite() => Some(Dimension::Px(v.max(0.0))),
            Dimension::Percent(p) if p.is_finite() => Some(Dimension::Percent(p.max(0.0))),
            Dimension::Auto => Some(Dimension::Auto),
            _ => None,
        }
    }

    /// CSS rendering; pixel values are truncated to whole pixels
    pub fn to_css(&self) -> String {
        match self {
            Dimension::Px(v) => format!("{}px", clamp_length(v.trunc()) as i64),
            Dimension::Percent(p) => format!("{}%", clamp_length(*p)),
            Dimension::Auto => "auto".to_string(),
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Stretching modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StretchingMode {
    /// Fluid detection, falls back to `None`
    #[default]
    Auto,
    /// Fill the outer container, preserving aspect ratio
    Fill,
    /// Track the parent width
    Responsive,
    /// Literal configured dimensions
    None,
}

impl std::fmt::Display for StretchingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StretchingMode::Auto => write!(f, "auto"),
            StretchingMode::Fill => write!(f, "fill"),
            StretchingMode::Responsive => write!(f, "responsive"),
            StretchingMode::None => write!(f, "none"),
        }
    }
}

/// HTML media ready states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

/// Player lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    /// DOM built, renderer not attached yet
    Constructed,
    /// Waiting for the renderer's ready callback
    AwaitingMedia,
    /// Controls built and wired
    Ready,
    /// Media is playing
    Playing,
    /// Media is paused
    Paused,
    /// Player torn down
    Removed,
}

impl PlayerState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        matches!(
            (self, target),
            (Constructed, AwaitingMedia) |
            (AwaitingMedia, Ready) |
            (Ready, Playing) | (Ready, Paused) |
            (Playing, Paused) |
            (Paused, Playing) |
            (_, Removed)
        ) && *self != Removed
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Constructed => write!(f, "constructed"),
            PlayerState::AwaitingMedia => write!(f, "awaiting-media-ready"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Removed => write!(f, "removed"),
        }
    }
}

/// Notifications dispatched for the player container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlsEvent {
    Shown,
    Hidden,
    Ready,
    Resize,
}

impl ControlsEvent {
    /// DOM event name
    pub fn event_name(&self) -> &'static str {
        match self {
            ControlsEvent::Shown => "controlsshown",
            ControlsEvent::Hidden => "controlshidden",
            ControlsEvent::Ready => "controlsready",
            ControlsEvent::Resize => "controlsresize",
        }
    }
}

/// A notification together with its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerEvent {
    pub player: PlayerId,
    pub container: NodeId,
    pub kind: ControlsEvent,
}

/// Device traits that change how the chrome behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Platform {
    pub android: bool,
    pub stock_android: bool,
    pub ios: bool,
    pub ipad: bool,
    pub iphone: bool,
}

impl Platform {
    /// Touch platforms toggle controls on tap instead of hover
    pub fn is_touch(&self) -> bool {
        self.android || self.ios
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_parse() {
        assert_eq!(Dimension::parse("640").unwrap(), Dimension::Px(640.0));
        assert_eq!(Dimension::parse("640px").unwrap(), Dimension::Px(640.0));
        assert_eq!(Dimension::parse("100%").unwrap(), Dimension::Percent(100.0));
        assert_eq!(Dimension::parse("auto").unwrap(), Dimension::Auto);
        assert!(Dimension::parse("wide").is_err());
        assert_eq!(Dimension::from_css("12em"), None);
    }

    #[test]
    fn test_dimension_css() {
        assert_eq!(Dimension::Px(640.7).to_css(), "640px");
        assert_eq!(Dimension::Px(f64::NAN).to_css(), "0px");
        assert_eq!(Dimension::Percent(100.0).to_css(), "100%");
        assert_eq!(Dimension::Percent(f64::NAN).to_css(), "0%");
        assert_eq!(Dimension::Percent(-50.0).to_css(), "0%");
        assert_eq!(Dimension::Px(-20.0).to_css(), "0px");
    }

    #[test]
    fn test_dimension_parse_clamps() {
        assert!(Dimension::parse("NaN").is_err());
        assert!(Dimension::parse("NaN%").is_err());
        assert!(Dimension::parse("inf px").is_err());
        assert_eq!(Dimension::parse("-50%").unwrap(), Dimension::Percent(0.0));
        assert_eq!(Dimension::parse("-20px").unwrap(), Dimension::Px(0.0));
        assert_eq!(Dimension::from_css("NaN%"), None);
    }

    #[test]
    fn test_dimension_json() {
        let d: Dimension = serde_json::from_str("480").unwrap();
        assert_eq!(d, Dimension::Px(480.0));
        let d: Dimension = serde_json::from_str("\"50%\"").unwrap();
        assert_eq!(d, Dimension::Percent(50.0));
        assert!(!Dimension::Px(-1.0).is_forced());
        let d: Dimension = serde_json::from_str("\"NaN%\"").unwrap();
        assert_eq!(d, Dimension::Auto);
        assert!(serde_json::from_str::<Dimension>("\"wide\"").is_err());
    }

    #[test]
    fn test_dimension_normalized() {
        assert_eq!(Dimension::Percent(-50.0).normalized(), Some(Dimension::Percent(0.0)));
        assert_eq!(Dimension::Percent(f64::NAN).normalized(), None);
        assert_eq!(Dimension::Px(f64::INFINITY).normalized(), None);
        assert_eq!(Dimension::Px(320.0).normalized(), Some(Dimension::Px(320.0)));
    }

    #[test]
    fn test_state_transitions() {
        assert!(PlayerState::Constructed.can_transition_to(PlayerState::AwaitingMedia));
        assert!(PlayerState::Ready.can_transition_to(PlayerState::Playing));
        assert!(PlayerState::Playing.can_transition_to(PlayerState::Removed));
        assert!(!PlayerState::Removed.can_transition_to(PlayerState::Removed));
        assert!(!PlayerState::Constructed.can_transition_to(PlayerState::Playing));
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(3).to_string(), "mep_3");
    }
}
