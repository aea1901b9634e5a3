//! Geographic viewport rectangles
//!
//! Bounds are plain WGS84 degrees. Internally they are a `geo::Rect` with
//! x = longitude and y = latitude, so they can be handed to other `geo`
//! algorithms without conversion.

use crate::{Result, TreeMapError};
use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic rectangle in degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds", into = "RawBounds")]
pub struct ViewportBounds {
    rect: Rect<f64>,
}

/// Wire shape used by the backend and by persisted state
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawBounds {
    min_lat: f64,
    min_lng: f64,
    max_lat: f64,
    max_lng: f64,
}

impl ViewportBounds {
    /// Create bounds from the four edges
    ///
    /// Fails if any edge is not finite or if a minimum exceeds its maximum.
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Result<Self> {
        if ![min_lat, min_lng, max_lat, max_lng]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(TreeMapError::InvalidBounds(format!(
                "non-finite edge in ({min_lat}, {min_lng}, {max_lat}, {max_lng})"
            )));
        }
        if min_lat > max_lat {
            return Err(TreeMapError::InvalidBounds(format!(
                "min_lat {min_lat} > max_lat {max_lat}"
            )));
        }
        if min_lng > max_lng {
            return Err(TreeMapError::InvalidBounds(format!(
                "min_lng {min_lng} > max_lng {max_lng}"
            )));
        }
        Ok(Self::from_rect_unchecked(min_lat, min_lng, max_lat, max_lng))
    }

    /// Build bounds from two arbitrary corners, ordering the edges as needed
    ///
    /// Map widgets report corners in screen order (top-left, bottom-right), which
    /// does not match min/max order.
    pub fn from_corners(lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> Result<Self> {
        Self::new(
            lat_a.min(lat_b),
            lng_a.min(lng_b),
            lat_a.max(lat_b),
            lng_a.max(lng_b),
        )
    }

    #[inline]
    fn from_rect_unchecked(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            rect: Rect::new(
                Coord {
                    x: min_lng,
                    y: min_lat,
                },
                Coord {
                    x: max_lng,
                    y: max_lat,
                },
            ),
        }
    }

    #[inline]
    pub fn min_lat(&self) -> f64 {
        self.rect.min().y
    }

    #[inline]
    pub fn min_lng(&self) -> f64 {
        self.rect.min().x
    }

    #[inline]
    pub fn max_lat(&self) -> f64 {
        self.rect.max().y
    }

    #[inline]
    pub fn max_lng(&self) -> f64 {
        self.rect.max().x
    }

    /// Underlying `geo` rectangle (x = longitude, y = latitude)
    #[inline]
    pub fn as_rect(&self) -> &Rect<f64> {
        &self.rect
    }

    /// Height of the rectangle in degrees of latitude
    #[inline]
    pub fn lat_span(&self) -> f64 {
        self.rect.height()
    }

    /// Width of the rectangle in degrees of longitude
    #[inline]
    pub fn lng_span(&self) -> f64 {
        self.rect.width()
    }

    /// Center as `(lat, lng)`
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        let c = self.rect.center();
        (c.y, c.x)
    }

    /// Scale the rectangle around its center
    ///
    /// A factor of 1.5 pads every side by a quarter of the span on that axis, so
    /// the result is 1.5x as tall and 1.5x as wide. Factors below 1.0 are treated
    /// as 1.0; the expanded rectangle always contains the original.
    pub fn expand(&self, factor: f64) -> Self {
        let factor = factor.max(1.0);
        let lat_padding = self.lat_span() * (factor - 1.0) / 2.0;
        let lng_padding = self.lng_span() * (factor - 1.0) / 2.0;
        Self::from_rect_unchecked(
            self.min_lat() - lat_padding,
            self.min_lng() - lng_padding,
            self.max_lat() + lat_padding,
            self.max_lng() + lng_padding,
        )
    }

    /// Round the edges outward onto a decimal grid
    ///
    /// Minimums are floored and maximums ceiled, so the snapped rectangle always
    /// contains the input. Used to keep request parameters stable.
    pub fn snap_outward(&self, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals.min(12) as i32);
        Self::from_rect_unchecked(
            (self.min_lat() * scale).floor() / scale,
            (self.min_lng() * scale).floor() / scale,
            (self.max_lat() * scale).ceil() / scale,
            (self.max_lng() * scale).ceil() / scale,
        )
    }

    /// Whether `other` lies entirely inside `self` (edges inclusive)
    #[inline]
    pub fn contains(&self, other: &ViewportBounds) -> bool {
        other.min_lat() >= self.min_lat()
            && other.min_lng() >= self.min_lng()
            && other.max_lat() <= self.max_lat()
            && other.max_lng() <= self.max_lng()
    }

    /// Whether a point lies inside the rectangle (edges inclusive)
    #[inline]
    pub fn contains_point(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat() && lat <= self.max_lat() && lng >= self.min_lng() && lng <= self.max_lng()
    }

    /// Approximate equality, used to detect a settled map view
    #[inline]
    pub fn approx_eq(&self, other: &ViewportBounds, epsilon: f64) -> bool {
        (self.min_lat() - other.min_lat()).abs() <= epsilon
            && (self.min_lng() - other.min_lng()).abs() <= epsilon
            && (self.max_lat() - other.max_lat()).abs() <= epsilon
            && (self.max_lng() - other.max_lng()).abs() <= epsilon
    }
}

impl TryFrom<RawBounds> for ViewportBounds {
    type Error = TreeMapError;

    fn try_from(raw: RawBounds) -> Result<Self> {
        Self::new(raw.min_lat, raw.min_lng, raw.max_lat, raw.max_lng)
    }
}

impl From<ViewportBounds> for RawBounds {
    fn from(bounds: ViewportBounds) -> Self {
        Self {
            min_lat: bounds.min_lat(),
            min_lng: bounds.min_lng(),
            max_lat: bounds.max_lat(),
            max_lng: bounds.max_lng(),
        }
    }
}

impl fmt::Display for ViewportBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.5}, {:.5}) - ({:.5}, {:.5})",
            self.min_lat(),
            self.min_lng(),
            self.max_lat(),
            self.max_lng()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn bounds(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> ViewportBounds {
        ViewportBounds::new(min_lat, min_lng, max_lat, max_lng).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_edges() {
        assert!(ViewportBounds::new(15.1, 120.6, 14.9, 120.8).is_err());
        assert!(ViewportBounds::new(14.9, 120.8, 15.1, 120.6).is_err());
        assert!(ViewportBounds::new(f64::NAN, 120.6, 15.1, 120.8).is_err());
        assert!(ViewportBounds::new(14.9, 120.6, f64::INFINITY, 120.8).is_err());
    }

    #[test]
    fn test_from_corners_orders_edges() {
        let b = ViewportBounds::from_corners(15.1, 120.6, 14.9, 120.8).unwrap();
        assert_eq!(b.min_lat(), 14.9);
        assert_eq!(b.max_lat(), 15.1);
        assert_eq!(b.min_lng(), 120.6);
        assert_eq!(b.max_lng(), 120.8);
    }

    #[test]
    fn test_expand_scales_around_center() {
        let b = bounds(14.9, 120.6, 15.1, 120.8);
        let e = b.expand(1.5);

        assert!((e.min_lat() - 14.85).abs() < EPS);
        assert!((e.max_lat() - 15.15).abs() < EPS);
        assert!((e.min_lng() - 120.55).abs() < EPS);
        assert!((e.max_lng() - 120.85).abs() < EPS);

        let (clat, clng) = e.center();
        let (olat, olng) = b.center();
        assert!((clat - olat).abs() < EPS);
        assert!((clng - olng).abs() < EPS);
        assert!((e.lat_span() - b.lat_span() * 1.5).abs() < EPS);
        assert!((e.lng_span() - b.lng_span() * 1.5).abs() < EPS);
    }

    #[test]
    fn test_expand_never_shrinks() {
        let b = bounds(0.0, 0.0, 1.0, 1.0);
        assert_eq!(b.expand(0.5), b);
        assert!(b.expand(2.0).contains(&b));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let outer = bounds(0.0, 0.0, 1.0, 1.0);
        assert!(outer.contains(&outer));
        assert!(outer.contains(&bounds(0.2, 0.2, 0.8, 0.8)));
        assert!(!outer.contains(&bounds(0.2, 0.2, 1.1, 0.8)));
        assert!(!outer.contains(&bounds(-0.1, 0.2, 0.8, 0.8)));
    }

    #[test]
    fn test_contains_point() {
        let b = bounds(14.9, 120.6, 15.1, 120.8);
        assert!(b.contains_point(15.0, 120.7));
        assert!(b.contains_point(14.9, 120.6));
        assert!(!b.contains_point(15.2, 120.7));
        assert!(!b.contains_point(15.0, 120.9));
    }

    #[test]
    fn test_snap_outward_contains_input() {
        let b = bounds(14.85003, 120.55007, 15.14996, 120.84991);
        let s = b.snap_outward(4);
        assert!(s.contains(&b));
        assert!((s.min_lat() - 14.85).abs() < 1e-6);
        assert!((s.max_lng() - 120.85).abs() < 1e-6);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let b = bounds(14.9, 120.6, 15.1, 120.8);
        let json = serde_json::to_value(b).unwrap();
        assert_eq!(json["min_lat"], 14.9);
        assert_eq!(json["max_lng"], 120.8);

        let back: ViewportBounds = serde_json::from_value(json).unwrap();
        assert_eq!(back, b);

        let bad = serde_json::json!({"min_lat": 2.0, "min_lng": 0.0, "max_lat": 1.0, "max_lng": 1.0});
        assert!(serde_json::from_value::<ViewportBounds>(bad).is_err());
    }
}
