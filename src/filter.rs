use nalgebra::{SMatrix, SVector};

use crate::bbox::Rect;
use crate::error::Error;

/// State layout: `[x, vx, ax, y, vy, ay, w, vw, aw, h, vh, ah]`, one
/// position/velocity/acceleration block per measured dimension.
pub const STATE_DIM: usize = 12;
pub const MEASUREMENT_DIM: usize = 4;

type StateVector = SVector<f32, STATE_DIM>;
type StateMatrix = SMatrix<f32, STATE_DIM, STATE_DIM>;
type Measurement = SVector<f32, MEASUREMENT_DIM>;
type MeasurementMatrix = SMatrix<f32, MEASUREMENT_DIM, STATE_DIM>;
type MeasurementCov = SMatrix<f32, MEASUREMENT_DIM, MEASUREMENT_DIM>;

/// Hook invoked after each predict/correct step, replacing any debug-only
/// state tracing inside the filter itself. Wired in via
/// [`TrackManager::with_observer`](crate::manager::TrackManager::with_observer).
pub trait StateObserver: Send {
    fn on_predict(&mut self, track_id: u64, state: &[f32; STATE_DIM], cov_diag: &[f32; STATE_DIM]);
    fn on_correct(&mut self, track_id: u64, state: &[f32; STATE_DIM], cov_diag: &[f32; STATE_DIM]);
}

/// Constant-acceleration Kalman filter over the box center, width and height.
///
/// The transition matrix F and process noise Q are block diagonal with one
/// 3x3 block per measured dimension; Q uses the continuous
/// white-noise-acceleration model (closed-form integrals of the acceleration
/// spectral density over `[0, dt]`).
#[derive(Debug, Clone)]
pub struct MotionFilter {
    t: f32,
    dt: f32,
    qn: [f32; 4],
    transition: StateMatrix,
    process_noise: StateMatrix,
    measurement: MeasurementMatrix,
    measurement_noise: MeasurementCov,
    state: StateVector,
    covariance: StateMatrix,
}

#[inline]
fn measurement_from_rect(rect: &Rect) -> Measurement {
    let (cx, cy) = rect.center();
    Measurement::new(cx, cy, rect.width, rect.height)
}

impl MotionFilter {
    /// Seeds the filter from the first measurement: positions from the box,
    /// velocities and accelerations at zero. The initial covariance guesses
    /// one box-size-per-timestep of velocity uncertainty for x/y and
    /// `var_factor` times the process-noise block everywhere else.
    ///
    /// `rn` is the measurement variance per (x, y, w, h), `qn` the process
    /// (acceleration) variance per dimension. Both must be positive; the
    /// caller validates them before any filter is built.
    pub fn new(t: f32, dt: f32, rect: Rect, rn: [f32; 4], qn: [f32; 4], var_factor: f32) -> Self {
        let mut measurement = MeasurementMatrix::zeros();
        measurement[(0, 0)] = 1.0;
        measurement[(1, 3)] = 1.0;
        measurement[(2, 6)] = 1.0;
        measurement[(3, 9)] = 1.0;

        let mut measurement_noise = MeasurementCov::zeros();
        for (i, var) in rn.iter().enumerate() {
            measurement_noise[(i, i)] = *var;
        }

        let mut filter = Self {
            t,
            // sentinel so the first set_time_step always rebuilds F and Q
            dt: -1.0,
            qn,
            transition: StateMatrix::identity(),
            process_noise: StateMatrix::zeros(),
            measurement,
            measurement_noise,
            state: StateVector::zeros(),
            covariance: StateMatrix::zeros(),
        };
        filter.set_time_step(dt);

        let z0 = measurement_from_rect(&rect);
        filter.state[0] = z0[0];
        filter.state[3] = z0[1];
        filter.state[6] = z0[2];
        filter.state[9] = z0[3];

        let p = &mut filter.covariance;
        let q = &filter.process_noise;

        p[(0, 0)] = rn[0];
        p[(1, 1)] = (z0[2] / dt) * (z0[2] / dt);
        p[(2, 2)] = var_factor * q[(2, 2)];

        p[(3, 3)] = rn[1];
        p[(4, 4)] = (z0[3] / dt) * (z0[3] / dt);
        p[(5, 5)] = var_factor * q[(5, 5)];

        p[(6, 6)] = rn[2];
        p[(7, 7)] = var_factor * q[(7, 7)];
        p[(8, 8)] = var_factor * q[(8, 8)];

        p[(9, 9)] = rn[3];
        p[(10, 10)] = var_factor * q[(10, 10)];
        p[(11, 11)] = var_factor * q[(11, 11)];

        filter
    }

    /// Rebuilds F and Q for a new timestep. Epsilon-guarded: a materially
    /// unchanged `dt` leaves both matrices untouched.
    fn set_time_step(&mut self, dt: f32) {
        if (self.dt - dt).abs() <= 2.0 * f32::EPSILON {
            return;
        }
        self.dt = dt;

        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt2 * dt2;
        let dt5 = dt2 * dt3;

        let half_dt2 = 0.5 * dt2;

        for b in 0..4 {
            let i = 3 * b;

            self.transition[(i, i + 1)] = dt;
            self.transition[(i + 1, i + 2)] = dt;
            self.transition[(i, i + 2)] = half_dt2;

            let qn = self.qn[b];
            self.process_noise[(i, i)] = qn * dt5 / 20.0;
            self.process_noise[(i + 1, i)] = qn * dt4 / 8.0;
            self.process_noise[(i, i + 1)] = qn * dt4 / 8.0;
            self.process_noise[(i + 2, i)] = qn * dt3 / 6.0;
            self.process_noise[(i, i + 2)] = qn * dt3 / 6.0;
            self.process_noise[(i + 1, i + 1)] = qn * dt3 / 3.0;
            self.process_noise[(i + 1, i + 2)] = qn * half_dt2;
            self.process_noise[(i + 2, i + 1)] = qn * half_dt2;
            self.process_noise[(i + 2, i + 2)] = qn * dt;
        }
    }

    /// Advances the state to time `t` with the standard predict step and
    /// records `t` as the new filter time.
    pub fn predict(&mut self, t: f32) {
        self.set_time_step(t - self.t);
        self.t = t;

        self.state = self.transition * self.state;
        self.covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process_noise;
    }

    /// Applies the standard Kalman correction for a measured box at the
    /// current filter time.
    pub fn correct(&mut self, rect: &Rect) -> Result<(), Error> {
        let z = measurement_from_rect(rect);
        let innovation = z - self.measurement * self.state;

        let s = self.measurement * self.covariance * self.measurement.transpose()
            + self.measurement_noise;
        let s_inv = s.try_inverse().ok_or(Error::Singular)?;

        let gain = self.covariance * self.measurement.transpose() * s_inv;

        self.state += gain * innovation;
        self.covariance = (StateMatrix::identity() - gain * self.measurement) * self.covariance;

        Ok(())
    }

    /// Bounding box for the current position sub-vector. Velocity and
    /// acceleration components stay filter-internal.
    pub fn state_rect(&self) -> Rect {
        Rect::from_center(self.state[0], self.state[3], self.state[6], self.state[9])
    }

    #[inline]
    pub fn last_time(&self) -> f32 {
        self.t
    }

    pub fn state_array(&self) -> [f32; STATE_DIM] {
        let mut out = [0.0; STATE_DIM];
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.state[i];
        }
        out
    }

    pub fn covariance_diagonal(&self) -> [f32; STATE_DIM] {
        let mut out = [0.0; STATE_DIM];
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.covariance[(i, i)];
        }
        out
    }
}
