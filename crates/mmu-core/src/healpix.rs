//! # HEALPix Indexing
//!
//! NESTED-scheme pixel indexing on the sphere, used to partition the output
//! dataset into `healpix=NNNN` directories.
//!
//! Coordinates are given as longitude / latitude in degrees (RA / Dec).
//! Results match `healpy.ang2pix(nside, lon, lat, lonlat=True, nest=True)`.

use std::f64::consts::FRAC_PI_4;
use thiserror::Error;

/// Resolution used for dataset partitioning.
pub const DEFAULT_NSIDE: u64 = 16;

/// Largest supported resolution order (`nside = 2^29`).
pub const MAX_ORDER: u32 = 29;

const JRLL: [u64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HealpixError {
    #[error("nside must be a power of two between 1 and 2^29, got {0}")]
    InvalidNside(u64),

    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),

    #[error("coordinates must be finite, got ({lon}, {lat})")]
    NonFinite { lon: f64, lat: f64 },

    #[error("pixel {pix} out of range for {npix} pixels")]
    PixelOutOfRange { pix: u64, npix: u64 },
}

// =============================================================================
// HEALPIX BASE
// =============================================================================

/// A HEALPix tessellation at a fixed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Healpix {
    nside: u64,
    order: u32,
}

impl Default for Healpix {
    fn default() -> Self {
        Self {
            nside: DEFAULT_NSIDE,
            order: DEFAULT_NSIDE.trailing_zeros(),
        }
    }
}

impl Healpix {
    /// Create a tessellation. `nside` must be a power of two.
    pub fn new(nside: u64) -> Result<Self, HealpixError> {
        if nside == 0 || !nside.is_power_of_two() || nside > (1 << MAX_ORDER) {
            return Err(HealpixError::InvalidNside(nside));
        }
        Ok(Self {
            nside,
            order: nside.trailing_zeros(),
        })
    }

    #[must_use]
    pub fn nside(&self) -> u64 {
        self.nside
    }

    /// Total number of pixels, `12 * nside^2`.
    #[must_use]
    pub fn npix(&self) -> u64 {
        12 * self.nside * self.nside
    }

    /// Zero-pad width for directory labels: the digit count of `npix`.
    #[must_use]
    pub fn label_width(&self) -> usize {
        crate::decimal_digits(self.npix())
    }

    /// Pixel containing the point at (`lon`, `lat`) degrees.
    pub fn ang2pix_lonlat(&self, lon: f64, lat: f64) -> Result<u64, HealpixError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(HealpixError::NonFinite { lon, lat });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(HealpixError::InvalidLatitude(lat));
        }

        let nside = self.nside as i64;
        let nside_f = self.nside as f64;
        let z = lat.to_radians().sin();
        let za = z.abs();

        // Longitude in units of quarter turns, in [0, 4).
        let mut tt = lon.rem_euclid(360.0) / 90.0;
        if tt >= 4.0 {
            tt -= 4.0;
        }

        let (face, ix, iy) = if za <= 2.0 / 3.0 {
            // Equatorial region
            let temp1 = nside_f * (0.5 + tt);
            let temp2 = nside_f * (z * 0.75);
            let jp = (temp1 - temp2) as i64;
            let jm = (temp1 + temp2) as i64;
            let ifp = jp >> self.order;
            let ifm = jm >> self.order;
            let face = if ifp == ifm {
                ifp | 4
            } else if ifp < ifm {
                ifp
            } else {
                ifm + 8
            };
            let ix = jm & (nside - 1);
            let iy = nside - (jp & (nside - 1)) - 1;
            (face, ix, iy)
        } else {
            // Polar caps
            let ntt = (tt as i64).min(3);
            let tp = tt - ntt as f64;
            let tmp = nside_f * (3.0 * (1.0 - za)).sqrt();
            let jp = ((tp * tmp) as i64).min(nside - 1);
            let jm = (((1.0 - tp) * tmp) as i64).min(nside - 1);
            if z >= 0.0 {
                (ntt, nside - jm - 1, nside - jp - 1)
            } else {
                (ntt + 8, jp, jm)
            }
        };

        Ok(self.xyf2nest(ix as u64, iy as u64, face as u64))
    }

    /// Centre of pixel `pix` as (`lon`, `lat`) degrees, `lon` in [0, 360).
    pub fn pix2ang_lonlat(&self, pix: u64) -> Result<(f64, f64), HealpixError> {
        let npix = self.npix();
        if pix >= npix {
            return Err(HealpixError::PixelOutOfRange { pix, npix });
        }

        let (ix, iy, face) = self.nest2xyf(pix);
        let nside = self.nside as i64;
        let fact2 = 4.0 / npix as f64;
        let fact1 = (2 * self.nside) as f64 * fact2;

        let jr = (JRLL[face] as i64) * nside - ix - iy - 1;
        let (z, nr) = if jr < nside {
            let nr = jr;
            (1.0 - (nr * nr) as f64 * fact2, nr)
        } else if jr > 3 * nside {
            let nr = 4 * nside - jr;
            ((nr * nr) as f64 * fact2 - 1.0, nr)
        } else {
            ((2 * nside - jr) as f64 * fact1, nside)
        };

        let mut tmp = JPLL[face] * nr + ix - iy;
        if tmp < 0 {
            tmp += 8 * nr;
        }
        let phi = FRAC_PI_4 * tmp as f64 / nr as f64;
        let lon = phi.to_degrees().rem_euclid(360.0);
        let lat = z.clamp(-1.0, 1.0).asin().to_degrees();
        Ok((lon, lat))
    }

    fn xyf2nest(&self, ix: u64, iy: u64, face: u64) -> u64 {
        (face << (2 * self.order)) + spread_bits(ix) + (spread_bits(iy) << 1)
    }

    fn nest2xyf(&self, pix: u64) -> (i64, i64, usize) {
        let npface = self.nside * self.nside;
        let face = (pix >> (2 * self.order)) as usize;
        let local = pix & (npface - 1);
        (
            compress_bits(local) as i64,
            compress_bits(local >> 1) as i64,
            face,
        )
    }
}

/// Interleave zero bits: `0b111` becomes `0b10101`.
fn spread_bits(v: u64) -> u64 {
    let mut x = v & 0xFFFF_FFFF;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    (x | (x << 1)) & 0x5555_5555_5555_5555
}

/// Inverse of [`spread_bits`] over the even bit positions.
fn compress_bits(v: u64) -> u64 {
    let mut x = v & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    (x | (x >> 16)) & 0xFFFF_FFFF
}

// =============================================================================
// TESTS
// =============================================================================
