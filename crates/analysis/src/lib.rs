use model::*;
use time::OffsetDateTime;

/// Pixels kept free around the outline when fitting it to a viewport.
pub const BORDER: i32 = 50;

/// Samples from `from` onward, up to and including the first one stamped
/// after `until`. Samples stamped before `from` are dropped wherever they sit.
pub fn window_trace(
    samples: &[PositionSample],
    from: OffsetDateTime,
    until: OffsetDateTime,
) -> Vec<&PositionSample> {
    let mut out = Vec::new();
    for s in samples {
        if s.timestamp < from {
            continue;
        }
        out.push(s);
        if s.timestamp > until {
            break;
        }
    }
    out
}

/// Keeps every third point plus the first and last.
pub fn downsample(points: &[Point]) -> Vec<Point> {
    let last = points.len().saturating_sub(1);
    points
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 == 0 || *i == last)
        .map(|(_, p)| *p)
        .collect()
}

pub fn extract_trace(
    samples: &[PositionSample],
    from: OffsetDateTime,
    until: OffsetDateTime,
) -> Vec<Point> {
    let pts: Vec<Point> = window_trace(samples, from, until)
        .into_iter()
        .map(Point::from_sample)
        .collect();
    downsample(&pts)
}

pub fn bounds_of(points: &[Point]) -> Option<Bounds> {
    let first = points.first()?;
    let init = Bounds { min_x: first.x, max_x: first.x, min_y: first.y, max_y: first.y };
    Some(points.iter().fold(init, |b, p| Bounds {
        min_x: b.min_x.min(p.x),
        max_x: b.max_x.max(p.x),
        min_y: b.min_y.min(p.y),
        max_y: b.max_y.max(p.y),
    }))
}

/// Fits `bounds` into a `width` x `height` viewport without distortion.
///
/// The scale is the larger of the two per-axis shrink factors, so the whole
/// outline fits. Offsets centre the scaled bounding box. When the track's
/// axes are swapped the X and Y ranges trade places and the vertical offset
/// is doubled, which is how those tracks were captured.
pub fn compute_layout(bounds: &Bounds, cfg: &TrackConfig, width: i32, height: i32) -> TrackLayout {
    let (across, down, max_across, max_down) = if cfg.axes_swapped {
        (bounds.y_range(), bounds.x_range(), bounds.max_y, bounds.max_x)
    } else {
        (bounds.x_range(), bounds.y_range(), bounds.max_x, bounds.max_y)
    };

    let scale = sanitize_scale((across / fit_span(width)).max(down / fit_span(height)));

    let centre_x = trunc(f64::from(max_across) / scale);
    let margin_x = trunc((f64::from(width) - across / scale) / 2.0);
    let x_offset = centre_x.saturating_add(margin_x);

    let centre_y = trunc(f64::from(max_down) / scale);
    let margin_y = trunc((f64::from(height) - down / scale) / 2.0);
    let y_inner = height.saturating_sub(centre_y.saturating_add(margin_y));
    let y_offset = if cfg.axes_swapped { y_inner.saturating_mul(2) } else { y_inner };

    TrackLayout { scale, x_offset, y_offset, rotation: cfg.rotation }
}

/// Maps a stored point into viewport coordinates, before rotation is applied.
/// X is mirrored against the viewport width.
pub fn project_point(layout: &TrackLayout, p: Point, width: i32) -> (f64, f64) {
    let x = (f64::from(width) - f64::from(p.x)) / layout.scale + f64::from(layout.x_offset);
    let y = f64::from(p.y) / layout.scale + f64::from(layout.y_offset);
    (x, y)
}

pub fn project_trace(layout: &TrackLayout, points: &[Point], width: i32) -> Vec<(f64, f64)> {
    points.iter().map(|p| project_point(layout, *p, width)).collect()
}

fn fit_span(px: i32) -> f64 {
    f64::from(px.saturating_sub(BORDER).max(1))
}

// zero-size outlines would otherwise divide by zero
fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 { scale } else { 1.0 }
}

fn trunc(v: f64) -> i32 {
    v as i32
}
