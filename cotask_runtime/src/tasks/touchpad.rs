//! Touch-panel task: five-point calibration, then an alpha-beta filter that
//! publishes ball position and velocity.
//!
//! Calibration touches the centre and four corners, one touch and release
//! per point, and fits the affine map raw → mm by least squares.

use cotask_common::hal::{BallState, TouchCalibration, TouchPanel};
use cotask_common::system::FilterConfig;
use tracing::{debug, info, warn};

use crate::calibration::CalibrationStore;
use crate::console::ConsoleHandle;
use crate::share::Share;
use crate::system::Shares;
use crate::task::{StateMachine, StepContext, TaskError, TaskState};
use crate::ticks::{Tick, ticks_to_secs};

/// Calibration targets [mm], in touch order.
pub const CAL_POINTS: [(f32, f32); 5] = [
    (0.0, 0.0),
    (-80.0, -40.0),
    (80.0, -40.0),
    (80.0, 40.0),
    (-80.0, 40.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchState {
    Init,
    LoadCal,
    Calibrate,
    SaveCal,
    Run,
}

impl TaskState for TouchState {
    fn label(self) -> &'static str {
        match self {
            Self::Init => "S_INIT",
            Self::LoadCal => "S_LOAD_CAL",
            Self::Calibrate => "S_CALIBRATE",
            Self::SaveCal => "S_SAVE_CAL",
            Self::Run => "S_RUN",
        }
    }
}

/// Least-squares affine fit of `targets ≈ M · [rx, ry, 1]`.
///
/// Returns `None` when the raw points do not span the plane.
pub fn fit_affine(raw: &[(f32, f32)], targets: &[(f32, f32)]) -> Option<TouchCalibration> {
    if raw.len() != targets.len() || raw.len() < 3 {
        return None;
    }

    let mut a = [[0.0f64; 3]; 3];
    let mut bx = [0.0f64; 3];
    let mut by = [0.0f64; 3];
    for (&(rx, ry), &(tx, ty)) in raw.iter().zip(targets) {
        let row = [f64::from(rx), f64::from(ry), 1.0];
        for i in 0..3 {
            for j in 0..3 {
                a[i][j] += row[i] * row[j];
            }
            bx[i] += row[i] * f64::from(tx);
            by[i] += row[i] * f64::from(ty);
        }
    }

    let inv = invert3(&a)?;
    let solve = |b: &[f64; 3]| -> [f32; 3] {
        let mut out = [0.0f32; 3];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (inv[i][0] * b[0] + inv[i][1] * b[1] + inv[i][2] * b[2]) as f32;
        }
        out
    };
    let [kxx, kxy, x0] = solve(&bx);
    let [kyx, kyy, y0] = solve(&by);
    Some(TouchCalibration {
        kxx,
        kxy,
        x0,
        kyx,
        kyy,
        y0,
    })
}

fn invert3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let c00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
    let c01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
    let c02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];
    let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
    let scale = m.iter().flatten().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || det.abs() <= 1e-12 * scale.powi(3) {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            c00 * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            c01 * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            c02 * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

/// Single-axis alpha-beta tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlphaBeta {
    pub position: f32,
    pub velocity: f32,
}

impl AlphaBeta {
    #[inline]
    pub fn update(&mut self, measured: f32, dt: f32, alpha: f32, beta: f32) {
        let predicted = self.position + self.velocity * dt;
        let residual = measured - predicted;
        self.position = predicted + alpha * residual;
        if dt > 0.0 {
            self.velocity += beta / dt * residual;
        }
    }
}

pub struct TouchpadTask {
    state: TouchState,
    panel: Box<dyn TouchPanel>,
    store: CalibrationStore,
    filter: FilterConfig,
    console: ConsoleHandle,
    ball: Share<BallState>,
    ready: Share<bool>,

    cal_index: usize,
    awaiting_release: bool,
    raw_points: [(f32, f32); 5],

    x: AlphaBeta,
    y: AlphaBeta,
    tracking: bool,
    lost_runs: u32,
    last_run: Option<Tick>,
}

impl TouchpadTask {
    pub fn new(
        panel: Box<dyn TouchPanel>,
        store: CalibrationStore,
        filter: FilterConfig,
        console: ConsoleHandle,
        shares: &Shares,
    ) -> Self {
        Self {
            state: TouchState::Init,
            panel,
            store,
            filter,
            console,
            ball: shares.ball.clone(),
            ready: shares.touch_ready.clone(),
            cal_index: 0,
            awaiting_release: false,
            raw_points: [(0.0, 0.0); 5],
            x: AlphaBeta::default(),
            y: AlphaBeta::default(),
            tracking: false,
            lost_runs: 0,
            last_run: None,
        }
    }

    fn begin_calibration(&mut self) {
        self.panel.set_calibration(&TouchCalibration::IDENTITY);
        self.cal_index = 0;
        self.awaiting_release = false;
        self.prompt_point();
        self.state = TouchState::Calibrate;
    }

    fn prompt_point(&self) {
        let (x, y) = CAL_POINTS[self.cal_index];
        self.console.write_line(&format!(
            "Touch point {} of {} at ({x}, {y}) mm",
            self.cal_index + 1,
            CAL_POINTS.len()
        ));
    }

    fn calibrate(&mut self) {
        let sample = self.panel.scan_xyz();
        if !self.awaiting_release {
            if sample.contact {
                self.raw_points[self.cal_index] = (sample.x, sample.y);
                self.awaiting_release = true;
                debug!(point = self.cal_index, raw_x = sample.x, raw_y = sample.y, "touch point recorded");
                self.console.write_line("Recorded, release the panel.");
            }
        } else if !sample.contact {
            self.awaiting_release = false;
            self.cal_index += 1;
            if self.cal_index == CAL_POINTS.len() {
                self.state = TouchState::SaveCal;
            } else {
                self.prompt_point();
            }
        }
    }

    fn save(&mut self) {
        let Some(cal) = fit_affine(&self.raw_points, &CAL_POINTS) else {
            warn!("touch calibration points are degenerate, restarting");
            self.console
                .write_line("Calibration points are degenerate, starting over.");
            self.begin_calibration();
            return;
        };
        self.panel.set_calibration(&cal);
        match self.store.save_touch(&cal) {
            Ok(()) => self
                .console
                .write_line("Touch panel calibrated, coefficients saved."),
            Err(e) => {
                warn!("touch calibration not saved: {e}");
                self.console
                    .write_line(&format!("Touch panel calibrated, save failed ({e})."));
            }
        }
        self.ready.write(true);
        self.state = TouchState::Run;
    }

    fn track(&mut self, ctx: StepContext) {
        let dt = match self.last_run {
            Some(last) => ticks_to_secs(ctx.width.diff(ctx.now, last)),
            None => ticks_to_secs(i64::from(ctx.period)),
        };
        self.last_run = Some(ctx.now);

        let sample = self.panel.scan_xyz();
        if sample.contact {
            self.lost_runs = 0;
            if self.tracking {
                let FilterConfig { alpha, beta, .. } = self.filter;
                self.x.update(sample.x, dt, alpha, beta);
                self.y.update(sample.y, dt, alpha, beta);
            } else {
                self.x = AlphaBeta {
                    position: sample.x,
                    velocity: 0.0,
                };
                self.y = AlphaBeta {
                    position: sample.y,
                    velocity: 0.0,
                };
                self.tracking = true;
            }
        } else {
            self.lost_runs = self.lost_runs.saturating_add(1);
            if self.tracking && self.lost_runs > self.filter.lost_contact_passes {
                debug!(runs = self.lost_runs, "contact lost, estimate reset");
                self.x = AlphaBeta::default();
                self.y = AlphaBeta::default();
                self.tracking = false;
            }
        }

        self.ball.write(BallState {
            x: self.x.position,
            vx: self.x.velocity,
            y: self.y.position,
            vy: self.y.velocity,
            contact: sample.contact,
        });
    }
}

impl StateMachine for TouchpadTask {
    type State = TouchState;

    fn state(&self) -> TouchState {
        self.state
    }

    fn advance(&mut self, ctx: StepContext) -> Result<(), TaskError> {
        match self.state {
            TouchState::Init => {
                self.ready.write(false);
                if self.store.exists() {
                    self.state = TouchState::LoadCal;
                } else {
                    info!(path = %self.store.path().display(), "no touch-panel calibration file");
                    self.begin_calibration();
                }
            }
            TouchState::LoadCal => match self.store.load_touch() {
                Ok(cal) => {
                    self.panel.set_calibration(&cal);
                    self.console
                        .write_line("Touch panel calibration loaded from file.");
                    self.ready.write(true);
                    self.state = TouchState::Run;
                }
                Err(e) => {
                    warn!(path = %self.store.path().display(), "touch calibration file unusable: {e}");
                    self.console
                        .write_line(&format!("Touch panel calibration file unusable ({e})."));
                    self.begin_calibration();
                }
            },
            TouchState::Calibrate => self.calibrate(),
            TouchState::SaveCal => self.save(),
            TouchState::Run => self.track(ctx),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemoryConsole;
    use crate::ticks::TickWidth;
    use cotask_common::hal::TouchSample;
    use cotask_common::system::ControlConfig;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct Script {
        scans: Rc<RefCell<VecDeque<TouchSample>>>,
        installed: Rc<RefCell<Option<TouchCalibration>>>,
    }

    impl TouchPanel for Script {
        fn scan_xyz(&mut self) -> TouchSample {
            self.scans.borrow_mut().pop_front().unwrap_or_default()
        }
        fn set_calibration(&mut self, coefficients: &TouchCalibration) {
            *self.installed.borrow_mut() = Some(*coefficients);
        }
    }

    fn touch(x: f32, y: f32) -> TouchSample {
        TouchSample {
            x,
            y,
            contact: true,
        }
    }

    fn ctx(now: u32) -> StepContext {
        StepContext {
            now,
            width: TickWidth::U32,
            period: 5_000,
        }
    }

    fn raw_of(mm: (f32, f32)) -> (f32, f32) {
        // A rotated, scaled and offset panel.
        (
            2000.0 + 10.0 * mm.0 + 0.5 * mm.1,
            1800.0 - 0.3 * mm.0 + 15.0 * mm.1,
        )
    }

    #[test]
    fn fit_recovers_exact_affine_map() {
        let raw: Vec<_> = CAL_POINTS.iter().map(|p| raw_of(*p)).collect();
        let cal = fit_affine(&raw, &CAL_POINTS).unwrap();
        for (r, t) in raw.iter().zip(CAL_POINTS) {
            let (x, y) = cal.apply(r.0, r.1);
            assert!((x - t.0).abs() < 1e-2, "x {x} vs {}", t.0);
            assert!((y - t.1).abs() < 1e-2, "y {y} vs {}", t.1);
        }
    }

    #[test]
    fn fit_rejects_collinear_points() {
        let raw = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)];
        assert!(fit_affine(&raw, &CAL_POINTS).is_none());
    }

    #[test]
    fn alpha_beta_converges_on_constant_velocity() {
        let mut f = AlphaBeta::default();
        let dt = 0.01;
        for k in 0..2_000 {
            f.update(5.0 * k as f32 * dt, dt, 0.85, 0.005);
        }
        assert!((f.velocity - 5.0).abs() < 0.05, "v = {}", f.velocity);
    }

    fn task(dir: &TempDir, panel: &Script, lost: u32) -> (TouchpadTask, Shares, MemoryConsole) {
        let shares = Shares::new(&ControlConfig::default());
        let console = MemoryConsole::new();
        let filter = FilterConfig {
            lost_contact_passes: lost,
            ..FilterConfig::default()
        };
        let t = TouchpadTask::new(
            Box::new(panel.clone()),
            CalibrationStore::new(dir.path().join("touch.txt")),
            filter,
            console.handle(),
            &shares,
        );
        (t, shares, console)
    }

    #[test]
    fn five_point_calibration_touch_and_release() {
        let dir = TempDir::new().unwrap();
        let panel = Script::default();
        {
            let mut scans = panel.scans.borrow_mut();
            for p in CAL_POINTS {
                let (rx, ry) = raw_of(p);
                scans.push_back(TouchSample::default());
                scans.push_back(touch(rx, ry));
                scans.push_back(touch(rx + 1.0, ry));
                scans.push_back(TouchSample::default());
            }
        }
        let (mut t, shares, console) = task(&dir, &panel, 10);

        t.advance(ctx(0)).unwrap();
        assert_eq!(t.state(), TouchState::Calibrate);
        assert_eq!(*panel.installed.borrow(), Some(TouchCalibration::IDENTITY));

        for _ in 0..CAL_POINTS.len() * 4 {
            t.advance(ctx(0)).unwrap();
        }
        assert_eq!(t.state(), TouchState::SaveCal);
        t.advance(ctx(0)).unwrap();
        assert_eq!(t.state(), TouchState::Run);
        assert!(shares.touch_ready.read());
        assert!(console.output().contains("Touch point 5 of 5"));

        let saved = CalibrationStore::new(dir.path().join("touch.txt"))
            .load_touch()
            .unwrap();
        let (x, y) = saved.apply(raw_of((80.0, 40.0)).0, raw_of((80.0, 40.0)).1);
        assert!((x - 80.0).abs() < 0.1 && (y - 40.0).abs() < 0.1);
        assert_eq!(*panel.installed.borrow(), Some(saved));
    }

    #[test]
    fn loaded_calibration_goes_straight_to_run() {
        let dir = TempDir::new().unwrap();
        CalibrationStore::new(dir.path().join("touch.txt"))
            .save_touch(&TouchCalibration::IDENTITY)
            .unwrap();
        let panel = Script::default();
        let (mut t, shares, _) = task(&dir, &panel, 10);
        t.advance(ctx(0)).unwrap();
        t.advance(ctx(0)).unwrap();
        assert_eq!(t.state(), TouchState::Run);
        assert!(shares.touch_ready.read());
    }

    #[test]
    fn lost_contact_resets_after_limit() {
        let dir = TempDir::new().unwrap();
        CalibrationStore::new(dir.path().join("touch.txt"))
            .save_touch(&TouchCalibration::IDENTITY)
            .unwrap();
        let panel = Script::default();
        {
            let mut scans = panel.scans.borrow_mut();
            scans.push_back(touch(10.0, -5.0));
            scans.push_back(touch(11.0, -5.0));
        }
        let (mut t, shares, _) = task(&dir, &panel, 2);
        t.advance(ctx(0)).unwrap();
        t.advance(ctx(0)).unwrap();

        t.advance(ctx(5_000)).unwrap();
        assert_eq!(shares.ball.read().x, 10.0);
        t.advance(ctx(10_000)).unwrap();
        let b = shares.ball.read();
        assert!(b.contact);
        assert!(b.x > 10.0 && b.vx > 0.0);

        // Two misses keep the estimate, the third resets it.
        t.advance(ctx(15_000)).unwrap();
        t.advance(ctx(20_000)).unwrap();
        let b = shares.ball.read();
        assert!(!b.contact);
        assert!(b.x > 10.0);
        t.advance(ctx(25_000)).unwrap();
        assert_eq!(shares.ball.read(), BallState::default());
    }
}
