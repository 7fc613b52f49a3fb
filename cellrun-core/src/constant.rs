// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

// Image extensions recognised as a dataset's multi-channel image
pub const SUPPORTED_IMAGE_FORMATS: [&str; 2] = ["tif", "tiff"];

// A dataset configuration is named `config.json` or `<anything>_config.json`
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CONFIG_FILE_SUFFIX: &str = "_config.json";

// Per-dataset artifact suffixes, prefixed by the dataset identifier
pub const MASK_SUFFIX: &str = "_segmented.tiff";
pub const MORPHOLOGY_SUFFIX: &str = "_morphology.csv";
pub const TYPE_SUFFIX: &str = "_deepcell_type.csv";
pub const POPULATION_SUFFIX: &str = "_deepcell_population.csv";
pub const SUMMARY_SUFFIX: &str = "_summary.json";

// Temporary artifacts live beside the final path until renamed into place
pub const PARTIAL_SUFFIX: &str = ".partial";

// Label written for objects the annotation service did not return
pub const UNCLASSIFIED: &str = "unclassified";

// Skip reasons
pub const SKIP_MISSING_NUCLEUS: &str = "missing nucleus channel";

// Annotation retry defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

// Default annotation model
pub const DEFAULT_ANNOTATION_MODEL: &str = "deepcell-types_2025-06-09";

// Environment variables consulted by the command-line layer
pub const ENV_ACCESS_TOKEN: &str = "DEEPCELL_ACCESS_TOKEN";
pub const ENV_WORKER: &str = "CELLRUN_WORKER";
pub const ENV_DEVICE: &str = "CELLRUN_DEVICE";

// Candidate OME-TIFF locations inside a raw HuBMAP CODEX dataset
pub const RAW_IMAGE_CANDIDATES: [&str; 3] = [
    "reg001_expr.ome.tiff",
    "pipeline_output/expr/reg001_expr.ome.tiff",
    "stitched/expressions/reg1_stitched_expressions.ome.tiff",
];

pub const RAW_PIPELINE_CONFIG: &str = "pipelineConfig.json";

// Names for morphological descriptors
pub const MORPHOLOGY_DESCRIPTOR_NAMES: [&str; 11] = [
    "object_id",
    "area",
    "perimeter",
    "centroid_x",
    "centroid_y",
    "bbox_min_x",
    "bbox_min_y",
    "bbox_max_x",
    "bbox_max_y",
    "equivalent_diameter",
    "extent",
];
