//! Filter type enumeration.
//!
//! Every filter type has a stable numeric code, a snake_case identifier used
//! by the CLI and pipeline files, and a category for grouping in listings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grouping of filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Normalization, gamma, resampling and range remapping
    Adjust,
    Blur,
    ToneMap,
    Denoise,
    /// Machine-learning based denoise and upscale
    MachineLearning,
    AntiAliasing,
    Edge,
    /// Weighted sums, products and binary operations
    Blend,
    Enhance,
    Transform,
    Noise,
    Other,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Adjust => "Adjust",
            Category::Blur => "Blur",
            Category::ToneMap => "Tone Mapping",
            Category::Denoise => "Denoise",
            Category::MachineLearning => "Machine Learning",
            Category::AntiAliasing => "Anti-aliasing",
            Category::Edge => "Edge Detection",
            Category::Blend => "Blending",
            Category::Enhance => "Enhance",
            Category::Transform => "Transform",
            Category::Noise => "Noise",
            Category::Other => "Other",
        }
    }

    /// Get all categories in display order.
    pub fn all() -> &'static [Category] {
        &[
            Category::Adjust,
            Category::Blur,
            Category::ToneMap,
            Category::Denoise,
            Category::MachineLearning,
            Category::AntiAliasing,
            Category::Edge,
            Category::Blend,
            Category::Enhance,
            Category::Transform,
            Category::Noise,
            Category::Other,
        ]
    }
}

macro_rules! filter_types {
    ($($variant:ident = $code:literal, $id:literal, $category:ident;)+) => {
        /// Kind of image filter.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        #[repr(u32)]
        pub enum FilterType {
            $($variant = $code,)+
        }

        impl FilterType {
            /// Every filter type, in code order of declaration.
            pub const ALL: &'static [FilterType] = &[$(FilterType::$variant,)+];

            /// Decode a numeric code.
            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some(FilterType::$variant),)+
                    _ => None,
                }
            }

            /// Identifier, e.g. `"gaussian_blur"`.
            pub fn id(self) -> &'static str {
                match self {
                    $(FilterType::$variant => $id,)+
                }
            }

            /// Grouping for listings.
            pub fn category(self) -> Category {
                match self {
                    $(FilterType::$variant => Category::$category,)+
                }
            }
        }
    };
}

filter_types! {
    Normalization = 0x1, "normalization", Adjust;
    GammaCorrection = 0x2, "gamma_correction", Adjust;
    Resample = 0x3, "resample", Adjust;
    ResampleDynamic = 0x24, "resample_dynamic", Adjust;
    RemapRange = 0x28, "remap_range", Adjust;
    GaussianBlur = 0x4, "gaussian_blur", Blur;
    MotionBlur = 0x1F, "motion_blur", Blur;
    ColorSpace = 0x5, "color_space", ToneMap;
    HueSaturation = 0x6, "hue_saturation", ToneMap;
    FilmicTonemap = 0x7, "filmic_tonemap", ToneMap;
    AcesTonemap = 0x41, "aces_tonemap", ToneMap;
    Reinhard02Tonemap = 0x8, "reinhard02_tonemap", ToneMap;
    ExponentialTonemap = 0x9, "exponential_tonemap", ToneMap;
    LinearTonemap = 0xA, "linear_tonemap", ToneMap;
    DragoTonemap = 0xB, "drago_tonemap", ToneMap;
    AutoLinearTonemap = 0x25, "autolinear_tonemap", ToneMap;
    MaxWhiteTonemap = 0x26, "maxwhite_tonemap", ToneMap;
    PhotoLinearTonemap = 0x27, "photo_linear_tonemap", ToneMap;
    PhotoTonemap = 0x29, "photo_tonemap", ToneMap;
    FilmicUnchartedTonemap = 0x4F, "filmic_uncharted_tonemap", ToneMap;
    BilateralDenoise = 0xC, "bilateral_denoise", Denoise;
    LwrDenoise = 0xD, "lwr_denoise", Denoise;
    EawDenoise = 0xE, "eaw_denoise", Denoise;
    MedianDenoise = 0x1E, "median_denoise", Denoise;
    AiDenoise = 0x3E, "ai_denoise", MachineLearning;
    AiUpscale = 0x3F, "ai_upscale", MachineLearning;
    CustomAiModel = 0x32, "custom_ai_model", MachineLearning;
    OpenImageDenoise = 0x4E, "openimage_denoise", MachineLearning;
    Mlaa = 0xF, "mlaa", AntiAliasing;
    AiTaaUpscale = 0x65, "ai_taa_upscale", MachineLearning;
    Sobel = 0x10, "sobel", Edge;
    Laplace = 0x11, "laplace", Edge;
    Emboss = 0x20, "emboss", Edge;
    WeightedSum = 0x12, "weighted_sum", Blend;
    Mult = 0x13, "mult", Blend;
    ScalarMult = 0x31, "scalar_mult", Blend;
    Sharpen = 0x14, "sharpen", Enhance;
    MotionBuffer = 0x15, "motion_buffer", Other;
    TemporalAccumulator = 0x16, "temporal_accumulator", Other;
    ShadowCatcher = 0x17, "shadow_catcher", Other;
    UserDefined = 0x18, "user_defined", Other;
    DilateErode = 0x1A, "dilate_erode", Other;
    Posterize = 0x1B, "posterize", Other;
    Bloom = 0x30, "bloom", Other;
    BloomRealtime = 0x57, "bloom_realtime", Other;
    DepthOfField = 0x33, "depth_of_field", Other;
    NdcDepth = 0x34, "ndc_depth", Other;
    Convert = 0x35, "convert", Other;
    BgraToRgba = 0x36, "bgra_to_rgba", Other;
    Spread = 0x1C, "spread", Noise;
    RgbNoise = 0x1D, "rgb_noise", Noise;
    FlipVertical = 0x21, "flip_vertical", Transform;
    FlipHorizontal = 0x22, "flip_horizontal", Transform;
    Rotate = 0x23, "rotate", Transform;
    Add = 0x50, "add", Blend;
    Mul = 0x51, "mul", Blend;
    Sub = 0x52, "sub", Blend;
    Div = 0x53, "div", Blend;
    Max = 0x54, "max", Blend;
    Min = 0x55, "min", Blend;
}

impl FilterType {
    /// Numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a filter type by identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.id() == id)
    }

    /// Whether the type needs model inference, which no device here provides.
    pub fn is_machine_learning(self) -> bool {
        self.category() == Category::MachineLearning
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
