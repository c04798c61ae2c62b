// Voxel classification against the solved clipping surface.
//
// The surface height is evaluated once per column of the independent plane,
// then every voxel compares its dependent coordinate against that height.
// Both passes run in bounded-size chunks over disjoint output regions, so
// chunking never changes the result and the only synchronization is the
// completion barrier of the parallel loop. A cancellation token is observed
// at chunk granularity so superseded generations never commit.

use crate::geometry::{KeptSide, Point3D, Vector3D};
use crate::tps::TpsModel;
use crate::volume::VolumeMeta;
use crate::{Error, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mask value for a voxel that is fully kept
pub const KEPT: u8 = 255;
/// Mask value for a voxel that is fully clipped
pub const CLIPPED: u8 = 0;

/// Shared flag that a newer edit raises to supersede an in-flight generation
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Resolution tier of a generated mask.
///
/// The preview tier is an explicit contract, not an incidental optimization:
/// during active dragging the caller may request a downscaled mask to stay
/// within the interactive frame budget, then a full-resolution mask once
/// editing settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskTier {
    Full,
    /// Divide each grid dimension by `downscale` (rounded up, at least 1)
    Preview { downscale: u32 },
}

impl MaskTier {
    fn downscale(self) -> f64 {
        match self {
            MaskTier::Full => 1.0,
            MaskTier::Preview { downscale } => downscale.max(1) as f64,
        }
    }
}

/// Configuration for mask generation
#[derive(Debug, Clone)]
pub struct MaskConfig {
    /// Voxels classified per work unit. The cancellation token is checked
    /// between units, so smaller chunks react faster at slightly more
    /// scheduling overhead.
    pub chunk_voxels: usize,

    /// Ceiling in bytes on what one generation allocates: the mask plus the
    /// per-column height table. Generation fails with `ResourceExceeded`
    /// when that total cannot fit at the requested tier.
    pub memory_ceiling_bytes: usize,

    /// Width of the soft classification band in physical units. At 0.0 the
    /// threshold is hard; larger values ramp mask values across the band for
    /// anti-aliased clipping.
    pub band_width: f64,

    pub tier: MaskTier,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            chunk_voxels: 1 << 16,
            memory_ceiling_bytes: usize::MAX,
            band_width: 0.0,
            tier: MaskTier::Full,
        }
    }
}

/// Per-voxel inclusion mask aligned to a volume's sampling grid.
///
/// Values are `KEPT`/`CLIPPED` under a hard threshold, or intermediate
/// inside a soft band. Consumed by the render driver by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipMask {
    /// Voxel counts along X, Y, Z (downscaled at the preview tier)
    pub dims: [usize; 3],

    /// Effective voxel spacing of this mask's grid
    pub spacing: Vector3D,

    pub origin: Point3D,

    /// X-fastest linear voxel data, one byte per voxel
    pub data: Vec<u8>,

    /// Generation of the TPS model that produced this mask
    pub generation: u64,

    pub kept_side: KeptSide,
}

impl ClipMask {
    pub fn value(&self, i: usize, j: usize, k: usize) -> u8 {
        self.data[(k * self.dims[1] + j) * self.dims[0] + i]
    }

    /// Whether the voxel is on the kept side (soft-band values round)
    pub fn is_kept(&self, i: usize, j: usize, k: usize) -> bool {
        self.value(i, j, k) >= 128
    }

    pub fn kept_count(&self) -> usize {
        self.data.iter().filter(|&&v| v >= 128).count()
    }
}

/// Generate the inclusion mask for a volume's sampling grid.
///
/// Every voxel's classification depends only on its own coordinate and the
/// model, so the work is embarrassingly parallel; results land in disjoint
/// regions of the output. Returns `Cancelled` without a partial mask when
/// the token is raised mid-flight.
pub fn generate_mask(
    model: &TpsModel,
    meta: &VolumeMeta,
    kept_side: KeptSide,
    config: &MaskConfig,
    cancel: &CancelToken,
) -> Result<ClipMask> {
    let ds = config.tier.downscale();
    let mut dims = [0usize; 3];
    let mut spacing = meta.spacing;
    for a in 0..3 {
        dims[a] = ((meta.dims[a] as f64 / ds).ceil() as usize).max(1);
        // Fewer samples cover the same physical extent, so the effective
        // spacing grows by the exact ratio rather than the nominal factor.
        spacing[a] = meta.spacing[a] * (meta.dims[a] as f64 / dims[a] as f64);
    }

    let axis = model.axis();
    let [iu, iv] = axis.independent();
    let ia = axis.index();
    let (du, dv) = (dims[iu], dims[iv]);

    // The ceiling covers everything this call allocates: the mask itself
    // plus the per-column height table.
    let voxels = dims[0] * dims[1] * dims[2];
    let required = voxels + du * dv * std::mem::size_of::<f64>();
    if required > config.memory_ceiling_bytes {
        return Err(Error::ResourceExceeded {
            required,
            ceiling: config.memory_ceiling_bytes,
        });
    }
    log::debug!(
        "Generating {}x{}x{} mask (tier {:?}, band {})...",
        dims[0],
        dims[1],
        dims[2],
        config.tier,
        config.band_width
    );

    // Pass 1: surface height per column of the independent plane.
    let mut heights = vec![0.0f64; du * dv];
    heights
        .par_chunks_mut(du)
        .enumerate()
        .try_for_each(|(v_idx, row)| -> Result<()> {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let v = meta.origin[iv] + spacing[iv] * v_idx as f64;
            for (u_idx, h) in row.iter_mut().enumerate() {
                let u = meta.origin[iu] + spacing[iu] * u_idx as f64;
                *h = model.height(u, v);
            }
            Ok(())
        })?;

    // Pass 2: classify voxels in disjoint chunks of the output.
    let mut data = vec![0u8; voxels];
    let chunk = config.chunk_voxels.max(1);
    let (dx, dy) = (dims[0], dims[1]);
    data.par_chunks_mut(chunk)
        .enumerate()
        .try_for_each(|(ci, out)| -> Result<()> {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let base = ci * chunk;
            for (offset, value) in out.iter_mut().enumerate() {
                let idx = base + offset;
                let ijk = [idx % dx, (idx / dx) % dy, idx / (dx * dy)];
                let dep = meta.origin[ia] + spacing[ia] * ijk[ia] as f64;
                let h = heights[ijk[iv] * du + ijk[iu]];
                *value = classify(kept_side.signed(dep - h), config.band_width);
            }
            Ok(())
        })?;

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    log::debug!("Mask generated ({} voxels).", voxels);
    Ok(ClipMask {
        dims,
        spacing,
        origin: meta.origin,
        data,
        generation: model.generation(),
        kept_side,
    })
}

/// Map a signed distance toward the kept side to a mask byte
fn classify(signed: f64, band_width: f64) -> u8 {
    if band_width <= 0.0 {
        if signed >= 0.0 {
            KEPT
        } else {
            CLIPPED
        }
    } else {
        let frac = (signed / band_width + 0.5).clamp(0.0, 1.0);
        (frac * f64::from(KEPT)).round() as u8
    }
}

/// Owns the last-known-good mask and supersession of in-flight generations.
///
/// Interactive edits can arrive faster than a solve + mask cycle completes.
/// The intended shape: `request` a token, run `generate_mask` under it on a
/// worker thread, then `commit` the result. A later `request` (the
/// superseding edit) cancels the running generation through its token and
/// invalidates its commit, while the committed mask stays displayable
/// throughout. Compute never holds the pipeline borrow, so edits are free
/// to supersede at any time.
#[derive(Debug, Default)]
pub struct MaskPipeline {
    committed: Option<Arc<ClipMask>>,
    inflight: Option<CancelToken>,
}

impl MaskPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new generation, superseding any in-flight one
    pub fn request(&mut self) -> CancelToken {
        if let Some(previous) = self.inflight.take() {
            log::debug!("Superseding an in-flight mask generation.");
            previous.cancel();
        }
        let token = CancelToken::new();
        self.inflight = Some(token.clone());
        token
    }

    /// Commit a finished generation. Rejected with `Cancelled` when the
    /// token was superseded after the mask finished computing, so a stale
    /// result can never replace a newer committed mask.
    pub fn commit(&mut self, mask: ClipMask, token: &CancelToken) -> Result<Arc<ClipMask>> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mask = Arc::new(mask);
        self.committed = Some(Arc::clone(&mask));
        self.inflight = None;
        Ok(mask)
    }

    /// The last successfully generated mask, if any
    pub fn committed(&self) -> Option<&Arc<ClipMask>> {
        self.committed.as_ref()
    }
}
