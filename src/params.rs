use crate::detail::DetailLevel;
use serde::Serialize;

/// Subjects covering less of the frame than this are too small to be selective about features.
pub const SMALL_COVERAGE_PCT: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterTier {
    /// Small subject in frame; most permissive extraction
    SmallCoverage,
    High,
    Medium,
    /// Soft or unassessed content; same knobs as `SmallCoverage`
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiftParameters {
    pub peak_threshold: f64,
    pub edge_threshold: f64,
    pub first_octave: i32,
    pub max_num_features: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSet {
    pub tier: ParameterTier,
    pub sift: SiftParameters,

    /// `Node:param=value` overrides for the full-pipeline mesh tool
    pub meshroom_overrides: Vec<String>,
}

const RELAXED_SIFT: SiftParameters = SiftParameters {
    peak_threshold: 0.001,
    edge_threshold: 15.0,
    first_octave: -1,
    max_num_features: 16384,
};

const HIGH_SIFT: SiftParameters = SiftParameters {
    peak_threshold: 0.004,
    edge_threshold: 10.0,
    first_octave: 0,
    max_num_features: 8192,
};

const MEDIUM_SIFT: SiftParameters = SiftParameters {
    peak_threshold: 0.002,
    edge_threshold: 12.0,
    first_octave: -1,
    max_num_features: 12288,
};

const HIGH_OVERRIDES: [&str; 5] = [
    "FeatureExtraction:describerTypes=dspsift",
    "FeatureExtraction:describerPreset=high",
    "FeatureMatching:guidedMatching=True",
    "DepthMap:downscale=2",
    "DepthMapFilter:minConsistentCameras=3",
];

const MEDIUM_OVERRIDES: [&str; 8] = [
    "FeatureExtraction:describerTypes=dspsift,akaze",
    "FeatureExtraction:describerPreset=high",
    "FeatureMatching:guidedMatching=True",
    "FeatureMatching:geometricErrorMax=5.0",
    "DepthMap:downscale=1",
    "DepthMap:sgmGammaC=8.0",
    "DepthMap:sgmGammaP=10.0",
    "DepthMapFilter:minConsistentCameras=2",
];

const RELAXED_OVERRIDES: [&str; 10] = [
    "FeatureExtraction:describerTypes=dspsift,akaze",
    "FeatureExtraction:describerPreset=ultra",
    "FeatureMatching:guidedMatching=True",
    "FeatureMatching:geometricErrorMax=6.0",
    "DepthMap:downscale=1",
    "DepthMap:sgmGammaC=10.0",
    "DepthMap:sgmGammaP=12.0",
    "DepthMap:sgmWSH=6",
    "DepthMapFilter:minConsistentCameras=2",
    "DepthMapFilter:minConsistentCamerasBadSimilarity=3",
];

fn to_strings(overrides: &[&str]) -> Vec<String> {
    overrides.iter().map(|s| s.to_string()).collect()
}

impl ParameterSet {
    pub fn for_tier(tier: ParameterTier) -> ParameterSet {
        let (sift, overrides): (SiftParameters, &[&str]) = match tier {
            ParameterTier::High => (HIGH_SIFT, &HIGH_OVERRIDES),
            ParameterTier::Medium => (MEDIUM_SIFT, &MEDIUM_OVERRIDES),
            ParameterTier::SmallCoverage | ParameterTier::Low => (RELAXED_SIFT, &RELAXED_OVERRIDES),
        };
        ParameterSet {
            tier,
            sift,
            meshroom_overrides: to_strings(overrides),
        }
    }
}

/// Coverage is checked first: a small subject gets the permissive set whatever its detail level.
pub fn select(detail_level: DetailLevel, coverage_pct: f64) -> ParameterSet {
    let tier = if coverage_pct < SMALL_COVERAGE_PCT {
        ParameterTier::SmallCoverage
    } else {
        match detail_level {
            DetailLevel::High => ParameterTier::High,
            DetailLevel::Medium => ParameterTier::Medium,
            DetailLevel::Low | DetailLevel::Unknown => ParameterTier::Low,
        }
    };
    let params = ParameterSet::for_tier(tier);
    info!(
        "SIFT: peak={}, edge={}, octave={}, max_features={} ({:?})",
        params.sift.peak_threshold,
        params.sift.edge_threshold,
        params.sift.first_octave,
        params.sift.max_num_features,
        params.tier
    );
    params
}
