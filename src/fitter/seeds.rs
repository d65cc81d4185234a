//! Transverse crossing seeds.
//!
//! Seeds are pure geometry: the first two prongs are projected onto the
//! transverse plane, where each is a line (negligible projected curvature)
//! or a circle, and the projections are intersected. Non-touching
//! projections still produce one seed at the midpoint of their gap, except
//! for parallel lines which produce none.
//!
//! The longitudinal seed is searched separately for each crossing: the z
//! at which the two propagated prongs pass closest to the crossing point,
//! by bounded golden-section search.

use nalgebra::Vector2;

use crate::track::VertexTrack;

/// Projected curvatures below this are treated as straight lines.
const CURV_EPS: f64 = 1e-9;
/// Cross products below this mean parallel line directions.
const PARALLEL_EPS: f64 = 1e-9;
/// Width of the golden-section bracket at which the z search stops.
const SEED_Z_TOL: f64 = 1e-3;

/// Up to two transverse seed positions.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Crossings {
    pub count: usize,
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl Crossings {
    fn push(&mut self, p: Vector2<f64>) {
        self.x[self.count] = p.x;
        self.y[self.count] = p.y;
        self.count += 1;
    }

    /// Collapse two seeds closer (squared) than `dist2` to their midpoint.
    pub fn merge_if_close(&mut self, dist2: f64) {
        if self.count == 2 {
            let dx = self.x[0] - self.x[1];
            let dy = self.y[0] - self.y[1];
            if dx * dx + dy * dy < dist2 {
                self.count = 1;
                self.x[0] = 0.5 * (self.x[0] + self.x[1]);
                self.y[0] = 0.5 * (self.y[0] + self.y[1]);
            }
        }
    }
}

/// Transverse projection of one prong.
enum Projection {
    Line { p: Vector2<f64>, u: Vector2<f64> },
    Circle { c: Vector2<f64>, r: f64 },
}

fn project<T: VertexTrack>(trc: &T, bz: f64) -> Projection {
    let d = trc.derivatives(bz);
    let p = Vector2::new(trc.x(), trc.y());
    let t = Vector2::new(d.dxdz, d.dydz);
    let speed2 = t.norm_squared();
    if speed2 < 1e-18 {
        // projection degenerates to a point
        return Projection::Circle { c: p, r: 0.0 };
    }
    // signed curvature of the projected path
    let cross = d.dxdz * d.d2ydz2 - d.dydz * d.d2xdz2;
    let k = cross / (speed2 * speed2.sqrt());
    if k.abs() < CURV_EPS {
        return Projection::Line {
            p,
            u: t / speed2.sqrt(),
        };
    }
    let u = t / speed2.sqrt();
    let c = p + Vector2::new(-u.y, u.x) / k;
    Projection::Circle { c, r: k.abs().recip() }
}

fn cross_lines(
    p0: Vector2<f64>,
    u0: Vector2<f64>,
    p1: Vector2<f64>,
    u1: Vector2<f64>,
    out: &mut Crossings,
) {
    let den = u0.x * u1.y - u0.y * u1.x;
    if den.abs() < PARALLEL_EPS {
        return;
    }
    let dp = p1 - p0;
    let s = (dp.x * u1.y - dp.y * u1.x) / den;
    out.push(p0 + u0 * s);
}

fn cross_circles(
    ca: Vector2<f64>,
    ra: f64,
    cb: Vector2<f64>,
    rb: f64,
    out: &mut Crossings,
) {
    let dvec = cb - ca;
    let d = dvec.norm();
    if d < 1e-9 {
        return; // concentric, no usable seed
    }
    let t = dvec / d;
    let along = (d * d + ra * ra - rb * rb) / (2.0 * d);
    let h2 = ra * ra - along * along;
    if h2 > 0.0 {
        let base = ca + t * along;
        let off = Vector2::new(-t.y, t.x) * h2.sqrt();
        out.push(base + off);
        out.push(base - off);
        return;
    }
    // no intersection: seed at the midpoint of the gap between the circles
    let (pa, pb) = if d > ra + rb {
        (ca + t * ra, cb - t * rb)
    } else if ra >= rb {
        (ca + t * ra, cb + t * rb)
    } else {
        (ca - t * ra, cb - t * rb)
    };
    out.push((pa + pb) * 0.5);
}

fn cross_line_circle(
    p: Vector2<f64>,
    u: Vector2<f64>,
    c: Vector2<f64>,
    r: f64,
    out: &mut Crossings,
) {
    let foot = p + u * (c - p).dot(&u);
    let h = (c - foot).norm();
    let disc = r * r - h * h;
    if disc > 0.0 {
        let s = disc.sqrt();
        out.push(foot + u * s);
        out.push(foot - u * s);
        return;
    }
    if h < 1e-12 {
        out.push(foot);
        return;
    }
    let nearest = c + (foot - c) * (r / h);
    out.push((foot + nearest) * 0.5);
}

/// Crossing points of the transverse projections of two prongs.
pub(crate) fn transverse_crossings<T: VertexTrack>(t0: &T, t1: &T, bz: f64) -> Crossings {
    let mut out = Crossings::default();
    match (project(t0, bz), project(t1, bz)) {
        (Projection::Line { p: p0, u: u0 }, Projection::Line { p: p1, u: u1 }) => {
            cross_lines(p0, u0, p1, u1, &mut out)
        }
        (Projection::Circle { c: ca, r: ra }, Projection::Circle { c: cb, r: rb }) => {
            cross_circles(ca, ra, cb, rb, &mut out)
        }
        (Projection::Line { p, u }, Projection::Circle { c, r })
        | (Projection::Circle { c, r }, Projection::Line { p, u }) => {
            cross_line_circle(p, u, c, r, &mut out)
        }
    }
    out
}

fn seed_distance2<T: VertexTrack>(w0: &mut T, w1: &mut T, seed: Vector2<f64>, z: f64) -> f64 {
    w0.propagate_to_z_linear(z);
    w1.propagate_to_z_linear(z);
    let d0 = Vector2::new(w0.x(), w0.y()) - seed;
    let d1 = Vector2::new(w1.x(), w1.y()) - seed;
    d0.norm_squared() + d1.norm_squared()
}

/// The z at which the two prongs pass closest to the transverse seed
/// point, by golden-section search over `range`.
///
/// Anchoring the search on the seed keeps the two crossing hypotheses of
/// an ambiguous geometry apart; a seed-blind gap minimization would start
/// both at the same z.
pub(crate) fn seed_z<T: VertexTrack>(t0: &T, t1: &T, seed: Vector2<f64>, range: (f64, f64)) -> f64 {
    const INV_PHI: f64 = 0.618_033_988_749_894_9;
    let (mut a, mut b) = range;
    let mut w0 = t0.clone();
    let mut w1 = t1.clone();
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = seed_distance2(&mut w0, &mut w1, seed, c);
    let mut fd = seed_distance2(&mut w0, &mut w1, seed, d);
    while b - a > SEED_Z_TOL {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = seed_distance2(&mut w0, &mut w1, seed, c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = seed_distance2(&mut w0, &mut w1, seed, d);
        }
    }
    0.5 * (a + b)
}
