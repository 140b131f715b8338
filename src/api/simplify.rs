//! 折线简化
//!
//! 先按径向距离去掉挨得太近的点，再做 Douglas-Peucker。
//! 距离都用平方比较，省掉开方。

pub type Point = [f64; 2];

/// 简化折线，首尾两点总是保留
///
/// - `tolerance`: 允许的偏差 (与坐标同单位)
/// - `highest_quality`: 为 `true` 时跳过径向距离预处理
pub fn simplify(points: &[Point], tolerance: f64, highest_quality: bool) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let sq_tolerance = tolerance * tolerance;
    let points = if highest_quality {
        points.to_vec()
    } else {
        simplify_radial_distance(points, sq_tolerance)
    };
    simplify_douglas_peucker(&points, sq_tolerance)
}

fn sq_distance(a: Point, b: Point) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// 点 `p` 到线段 `a-b` 的距离平方
fn sq_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let [mut x, mut y] = a;
    let dx = b[0] - x;
    let dy = b[1] - y;

    if dx != 0.0 || dy != 0.0 {
        let t = ((p[0] - x) * dx + (p[1] - y) * dy) / (dx * dx + dy * dy);
        if t > 1.0 {
            x = b[0];
            y = b[1];
        } else if t > 0.0 {
            x += dx * t;
            y += dy * t;
        }
    }

    sq_distance(p, [x, y])
}

fn simplify_radial_distance(points: &[Point], sq_tolerance: f64) -> Vec<Point> {
    let mut prev = points[0];
    let mut kept = vec![prev];

    for &point in &points[1..] {
        if sq_distance(point, prev) > sq_tolerance {
            kept.push(point);
            prev = point;
        }
    }

    let last = points[points.len() - 1];
    if prev != last {
        kept.push(last);
    }
    kept
}

fn simplify_douglas_peucker(points: &[Point], sq_tolerance: f64) -> Vec<Point> {
    let last = points.len() - 1;
    let mut kept = vec![points[0]];
    dp_step(points, 0, last, sq_tolerance, &mut kept);
    kept.push(points[last]);
    kept
}

fn dp_step(points: &[Point], first: usize, last: usize, sq_tolerance: f64, kept: &mut Vec<Point>) {
    let mut max_sq_dist = sq_tolerance;
    let mut index = None;

    for i in first + 1..last {
        let sq_dist = sq_segment_distance(points[i], points[first], points[last]);
        if sq_dist > max_sq_dist {
            index = Some(i);
            max_sq_dist = sq_dist;
        }
    }

    if let Some(index) = index {
        if index - first > 1 {
            dp_step(points, first, index, sq_tolerance, kept);
        }
        kept.push(points[index]);
        if last - index > 1 {
            dp_step(points, index, last, sq_tolerance, kept);
        }
    }
}
