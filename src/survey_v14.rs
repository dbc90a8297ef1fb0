//! Built-in schema for version 14 of the eDNA field sampling survey.

use crate::schema::{
    ColumnMapping, Condition, CoordinateFallback, DateColumn, DateKind, ExpansionSchema,
    JoinParent, JoinSchema, PeriodColumns, SurveySchema, SystemTypeRule, TableSchema,
};

pub const VERSION: &str = "v14";

fn mapped(pairs: &[(&str, &str)]) -> Vec<ColumnMapping> {
    pairs
        .iter()
        .map(|(source, target)| ColumnMapping {
            source: source.to_string(),
            target: target.to_string(),
        })
        .collect()
}

fn names(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

/// Survey fields carried onto every joined output, in output order.
const SURVEY_HEAD: &[&str] = &[
    "survey_global_id",
    "survey_datetime",
    "survey_month",
    "survey_year",
    "project_ids",
    "supervisor",
    "username",
    "recorder_first_name",
    "recorder_last_name",
    "system_type",
    "site_id",
    "other_site_id",
    "general_location_name",
];

const COORDINATES: &[&str] = &["lat_manual", "long_manual", "gps_cap_lat", "gps_cap_long"];

/// `SURVEY_HEAD`, then `middle`, then the coordinate columns.
fn survey_wrapped(middle: &[&str]) -> Vec<String> {
    let mut cols = names(SURVEY_HEAD);
    cols.extend(names(middle));
    cols.extend(names(COORDINATES));
    cols
}

fn survey_table() -> TableSchema {
    TableSchema {
        name: "survey".to_string(),
        source_file: "eDNA_Sampling_v14_0.csv".to_string(),
        columns: mapped(&[
            ("GlobalID", "survey_global_id"),
            ("Survey DateTime", "survey_datetime"),
            ("Affiliated Projects", "project_ids"),
            ("Supervisor", "supervisor"),
            ("username", "username"),
            ("Recorder First Name", "recorder_first_name"),
            ("Recorder Last Name", "recorder_last_name"),
            ("Site ID", "site_id"),
            ("Other Site ID", "other_site_id"),
            ("General Location Name", "general_location_name"),
            ("Latitude", "lat_manual"),
            ("Longitude", "long_manual"),
            ("gps_cap_lat", "gps_cap_lat"),
            ("gps_cap_long", "gps_cap_long"),
            ("gps_cap_alt", "gps_cap_alt"),
            ("gps_cap_horacc", "gps_cap_horacc"),
            ("gps_cap_vertacc", "gps_cap_vertacc"),
            ("Arrival DateTime", "arrival_datetime"),
            ("Water Turbidity", "env_obs_turbidity"),
            ("Precipitation", "env_obs_precip"),
            ("Wind Speed", "env_obs_wind_speed"),
            ("Cloud Cover", "env_obs_cloud_cover"),
            ("Biome", "env_biome"),
            ("Other Biome", "env_biome_other"),
            ("Feature", "env_feature"),
            ("Other Feature", "env_feature_other"),
            ("Material", "env_material"),
            ("Other Material", "env_material_other"),
            ("Environmental Notes", "env_notes"),
            ("Measurement Mode", "env_measure_mode"),
            ("Boat Type", "env_boat_type"),
            ("Bottom Depth", "env_bottom_depth"),
            ("Measurements Taken", "measurements_taken"),
            ("Designated Sub-Corer", "core_subcorer"),
            ("Designated Filterer", "water_filterer"),
            ("Survey Complete", "survey_complete"),
            ("QA Editor", "qa_editor"),
            ("QA DateTime", "qa_datetime"),
            ("QA Initials", "qa_initial"),
            ("x", "x"),
            ("y", "y"),
            ("EditDate", "survey_edit_datetime"),
            ("Editor", "survey_editor"),
            ("CreationDate", "survey_create_datetime"),
            ("Creator", "survey_creator"),
        ]),
        dates: vec![DateColumn {
            column: "survey_datetime".to_string(),
            kind: DateKind::Date,
        }],
        period: Some(PeriodColumns {
            date_column: "survey_datetime".to_string(),
            month: "survey_month".to_string(),
            year: "survey_year".to_string(),
        }),
        lowercase: Vec::new(),
        substitute: names(&["project_ids"]),
        system_type: Some(SystemTypeRule {
            site_column: "site_id".to_string(),
            target: "system_type".to_string(),
        }),
        coordinate_fallbacks: vec![
            CoordinateFallback {
                column: "lat_manual".to_string(),
                fallback: "gps_cap_lat".to_string(),
            },
            CoordinateFallback {
                column: "long_manual".to_string(),
                fallback: "gps_cap_long".to_string(),
            },
        ],
        audit_file: "survey_sub".to_string(),
        audit_columns: Some(names(&[
            "survey_global_id",
            "survey_datetime",
            "survey_month",
            "survey_year",
            "project_ids",
            "supervisor",
            "username",
            "recorder_first_name",
            "recorder_last_name",
            "system_type",
            "site_id",
            "other_site_id",
            "general_location_name",
            "lat_manual",
            "long_manual",
            "gps_cap_lat",
            "gps_cap_long",
            "arrival_datetime",
            "env_obs_turbidity",
            "env_obs_precip",
            "env_obs_wind_speed",
            "env_obs_cloud_cover",
            "env_biome",
            "env_biome_other",
            "env_feature",
            "env_feature_other",
            "env_material",
            "env_material_other",
            "env_notes",
            "env_measure_mode",
            "env_boat_type",
            "env_bottom_depth",
            "measurements_taken",
            "core_subcorer",
            "water_filterer",
            "survey_complete",
            "qa_editor",
            "qa_datetime",
            "qa_initial",
            "survey_create_datetime",
            "survey_creator",
            "survey_edit_datetime",
            "survey_editor",
        ])),
        audit_sort: names(&["survey_datetime", "survey_global_id"]),
    }
}

/// A child table with no derivations besides lower-casing and dates.
fn child_table(
    name: &str,
    source_file: &str,
    columns: &[(&str, &str)],
    lowercase: &[&str],
    dates: Vec<DateColumn>,
) -> TableSchema {
    TableSchema {
        name: name.to_string(),
        source_file: source_file.to_string(),
        columns: mapped(columns),
        dates,
        period: None,
        lowercase: names(lowercase),
        substitute: Vec::new(),
        system_type: None,
        coordinate_fallbacks: Vec::new(),
        audit_file: format!("{name}_sub"),
        audit_columns: None,
        audit_sort: Vec::new(),
    }
}

fn crew_table() -> TableSchema {
    child_table(
        "crew",
        "rep_crew_1.csv",
        &[
            ("GlobalID", "crew_global_id"),
            ("ParentGlobalID", "crew_ParentGlobalID"),
            ("Crew First Name", "crew_fname"),
            ("Crew Last Name", "crew_lname"),
            ("EditDate", "crew_edit_datetime"),
            ("Editor", "crew_editor"),
            ("CreationDate", "crew_create_datetime"),
            ("Creator", "crew_creator"),
        ],
        &[],
        Vec::new(),
    )
}

fn envmeas_table() -> TableSchema {
    child_table(
        "envmeas",
        "rep_envmeas_2.csv",
        &[
            ("GlobalID", "envmeas_GlobalID"),
            ("ParentGlobalID", "envmeas_ParentGlobalID"),
            ("Measurement DateTime", "envmeas_date"),
            ("Measurement Depth", "envmeas_depth"),
            ("Environmental Instrument", "envmeas_instrument"),
            ("CTD Filename", "ctd_filename"),
            ("CTD Notes", "ctd_notes"),
            ("YSI Filename", "ysi_filename"),
            ("YSI Model", "ysi_model"),
            ("YSI Serial Number", "ysi_serial_number"),
            ("YSI Notes", "ysi_notes"),
            ("Secchi Depth", "secchi_depth"),
            ("Secchi Notes", "secchi_notes"),
            ("Niskin Number", "niskin_number"),
            ("Niskin Notes", "niskin_notes"),
            ("Other Instruments", "other_instruments"),
            ("Environmental Measurements", "env_measurements"),
            ("Flow Rate", "flow_rate"),
            ("Water Temp", "water_temp"),
            ("Salinity", "salinity"),
            ("pH Scale", "ph"),
            ("PAR1", "par1"),
            ("PAR2", "par2"),
            ("Turbidity", "turbidity"),
            ("Conductivity", "conductivity"),
            ("Dissolved Oxygen", "do"),
            ("Pheophytin", "pheophytin"),
            ("Chlorophyll a", "chla"),
            ("Nitrate and Nitrite", "no3no2"),
            ("Nitrite", "no2"),
            ("Ammonium", "nh4"),
            ("Phosphate", "phosphate"),
            ("Bottom Substrate", "bottom_substrate"),
            ("Lab DateTime", "lab_date"),
            ("Measurement Notes", "envmeas_notes"),
            ("EditDate", "envmeas_edit_datetime"),
            ("Editor", "envmeas_editor"),
            ("CreationDate", "envmeas_create_datetime"),
            ("Creator", "envmeas_creator"),
        ],
        &["env_measurements"],
        Vec::new(),
    )
}

fn collection_table() -> TableSchema {
    child_table(
        "collection",
        "rep_collection_3.csv",
        &[
            ("GlobalID", "collection_GlobalID"),
            ("ParentGlobalID", "collection_ParentGlobalID"),
            ("Collection Type", "collection_type"),
            ("Water Collection DateTime", "water_collect_date"),
            ("Water Vessel Label", "water_vessel_label"),
            ("Water Control", "water_control"),
            ("Water Control Type", "water_control_type"),
            ("Water Collection Mode", "water_collect_mode"),
            ("Niskin Number", "water_niskin_number"),
            ("Niskin Volume", "water_niskin_vol"),
            ("Water Depth", "water_depth"),
            ("Water Vessel Volume", "water_vessel_vol"),
            ("Water Vessel Material", "water_vessel_material"),
            ("Water Vessel Color", "water_vessel_color"),
            ("Was Filtered", "was_filtered"),
            ("Water Collection Notes", "water_collect_notes"),
            ("Core DateTime Start", "core_datetime_start"),
            ("Core DateTime End", "core_datetime_end"),
            ("Core Label", "core_label"),
            ("Core Control", "core_control"),
            ("Core Method", "core_method"),
            ("Other Core Method", "core_method_other"),
            ("Depth Core Collected", "depth_core_collected"),
            ("Length of Core", "core_length"),
            ("Corer Diameter", "core_diameter"),
            ("Core Notes", "core_notes"),
            ("Subcores Taken", "subcores_taken"),
            ("Subcore DateTime Start", "subcore_datetime_start"),
            ("Subcore DateTime End", "subcore_datetime_end"),
            ("Sub-Corer First Name", "subcore_fname"),
            ("Sub-Corer Last Name", "subcore_lname"),
            ("Sub-Core Method", "subcore_method"),
            ("Other Sub-Core Method", "subcore_method_other"),
            ("Min Subcore Barcode", "min_subcore_barcode"),
            ("Max Subcore Barcode", "max_subcore_barcode"),
            ("Number of Sub-Cores", "number_subcores"),
            ("Length of Sub-Core", "subcore_length"),
            ("Sub-Core Diameter", "subcore_diameter"),
            ("Sub-Core Consistency Layer", "subcore_consistency_layer"),
            ("Purpose of Other Cores", "purpose_other_cores"),
            ("EditDate", "collection_edit_datetime"),
            ("Editor", "collection_editor"),
            ("CreationDate", "collection_create_datetime"),
            ("Creator", "collection_creator"),
        ],
        &["collection_type"],
        Vec::new(),
    )
}

fn filter_table() -> TableSchema {
    child_table(
        "filter",
        "rep_filter_4.csv",
        &[
            ("GlobalID", "filter_GlobalID"),
            ("ParentGlobalID", "filter_ParentGlobalID"),
            ("Is Prefilter", "is_prefilter"),
            ("Filter Location", "filter_location"),
            ("Filter Sample Label", "filter_label"),
            ("Filterer First Name", "filter_fname"),
            ("Filterer Last Name", "filter_lname"),
            ("Filter Barcode", "filter_barcode"),
            ("Filter DateTime", "filter_date"),
            ("Filter Method", "filter_method"),
            ("Other Filter Method", "filter_method_other"),
            ("Water Volume Filtered", "filter_vol"),
            ("Filter Type", "filter_type"),
            ("Other Filter Type", "filter_type_other"),
            ("Filter Pore Size", "filter_pore"),
            ("Filter Size", "filter_size"),
            ("Filter Notes", "filter_notes"),
            ("EditDate", "filter_edit_datetime"),
            ("Editor", "filter_editor"),
            ("CreationDate", "filter_create_datetime"),
            ("Creator", "filter_creator"),
        ],
        &["filter_type"],
        vec![DateColumn {
            column: "filter_date".to_string(),
            kind: DateKind::Timestamp,
        }],
    )
}

fn survey_sort() -> Vec<String> {
    names(&["survey_datetime", "survey_global_id"])
}

fn crew_join() -> JoinSchema {
    JoinSchema {
        name: "survey_crew_join".to_string(),
        child: "crew".to_string(),
        parent: JoinParent::Table("survey".to_string()),
        child_key: "crew_ParentGlobalID".to_string(),
        parent_key: "survey_global_id".to_string(),
        projection: survey_wrapped(&[
            "crew_fname",
            "crew_lname",
            "crew_global_id",
            "crew_ParentGlobalID",
            "survey_edit_datetime",
            "survey_create_datetime",
            "crew_create_datetime",
        ]),
        output_columns: None,
        discriminators: names(&["crew_fname", "crew_lname"]),
        sort_by: survey_sort(),
        index_after_filter: false,
        output_file: "survey_crew_join".to_string(),
    }
}

fn envmeas_join() -> JoinSchema {
    JoinSchema {
        name: "survey_envmeas_join".to_string(),
        child: "envmeas".to_string(),
        parent: JoinParent::Table("survey".to_string()),
        child_key: "envmeas_ParentGlobalID".to_string(),
        parent_key: "survey_global_id".to_string(),
        projection: survey_wrapped(&[
            "envmeas_date",
            "envmeas_depth",
            "envmeas_instrument",
            "ctd_filename",
            "ctd_notes",
            "ysi_filename",
            "ysi_model",
            "ysi_serial_number",
            "ysi_notes",
            "secchi_depth",
            "secchi_notes",
            "niskin_number",
            "niskin_notes",
            "other_instruments",
            "env_measurements",
            "flow_rate",
            "water_temp",
            "salinity",
            "ph",
            "par1",
            "par2",
            "turbidity",
            "conductivity",
            "do",
            "pheophytin",
            "chla",
            "no3no2",
            "no2",
            "nh4",
            "phosphate",
            "bottom_substrate",
            "lab_date",
            "envmeas_notes",
            "envmeas_GlobalID",
            "survey_edit_datetime",
            "survey_create_datetime",
            "envmeas_create_datetime",
        ]),
        output_columns: None,
        discriminators: names(&["env_measurements"]),
        sort_by: survey_sort(),
        index_after_filter: false,
        output_file: "survey_envmeas_join".to_string(),
    }
}

/// Collection fields shared by the working and the written projection.
const COLLECTION_CORE: &[&str] = &[
    "collection_type",
    "water_collect_date",
    "water_control",
    "water_control_type",
    "water_depth",
    "water_vessel_material",
    "water_vessel_color",
    "was_filtered",
    "water_vessel_label",
    "water_collect_notes",
    "core_datetime_start",
    "core_datetime_end",
    "core_label",
    "core_control",
    "core_method",
    "depth_core_collected",
    "core_length",
    "core_diameter",
    "core_notes",
    "subcores_taken",
];

const COLLECTION_TAIL: &[&str] = &[
    "purpose_other_cores",
    "collection_GlobalID",
    "survey_edit_datetime",
    "survey_create_datetime",
    "collection_create_datetime",
];

const SUBCORE_FIELDS: &[&str] = &[
    "subcore_datetime_start",
    "subcore_datetime_end",
    "subcore_fname",
    "subcore_lname",
    "subcore_method",
    "subcore_method_other",
    "min_subcore_barcode",
    "max_subcore_barcode",
    "number_subcores",
    "subcore_length",
    "subcore_diameter",
    "subcore_consistency_layer",
];

fn collection_join() -> JoinSchema {
    let working: Vec<&str> = COLLECTION_CORE
        .iter()
        .chain(SUBCORE_FIELDS)
        .chain(COLLECTION_TAIL)
        .copied()
        .collect();
    let written: Vec<&str> = COLLECTION_CORE
        .iter()
        .chain(COLLECTION_TAIL)
        .copied()
        .collect();
    JoinSchema {
        name: "survey_collection_join".to_string(),
        child: "collection".to_string(),
        parent: JoinParent::Table("survey".to_string()),
        child_key: "collection_ParentGlobalID".to_string(),
        parent_key: "survey_global_id".to_string(),
        projection: survey_wrapped(&working),
        output_columns: Some(survey_wrapped(&written)),
        discriminators: names(&["collection_type", "water_vessel_label", "core_label"]),
        sort_by: survey_sort(),
        index_after_filter: false,
        output_file: "survey_collection_join".to_string(),
    }
}

fn filter_join() -> JoinSchema {
    let mut projection = names(SURVEY_HEAD);
    projection.extend(names(&[
        "collection_type",
        "water_collect_date",
        "water_vessel_label",
        "water_collect_notes",
        "filter_date",
        "is_prefilter",
        "filter_type",
        "filter_type_other",
        "filter_label",
        "filter_barcode",
        "filter_notes",
        "collection_GlobalID",
        "filter_GlobalID",
        "survey_edit_datetime",
        "survey_create_datetime",
        "collection_create_datetime",
        "filter_create_datetime",
    ]));
    projection.extend(names(COORDINATES));
    JoinSchema {
        name: "clean_filter_join".to_string(),
        child: "filter".to_string(),
        parent: JoinParent::Join("survey_collection_join".to_string()),
        child_key: "filter_ParentGlobalID".to_string(),
        parent_key: "collection_GlobalID".to_string(),
        projection,
        output_columns: None,
        discriminators: names(&["filter_type", "filter_label"]),
        sort_by: names(&["survey_datetime", "survey_global_id", "filter_date"]),
        index_after_filter: true,
        output_file: "clean_filter_join".to_string(),
    }
}

fn subcore_expansion() -> ExpansionSchema {
    let mut middle = names(SUBCORE_FIELDS);
    middle.extend(names(COLLECTION_TAIL));
    let middle: Vec<&str> = middle.iter().map(String::as_str).collect();
    ExpansionSchema {
        name: "clean_subcore_join".to_string(),
        source: "survey_collection_join".to_string(),
        conditions: vec![
            Condition {
                column: "collection_type".to_string(),
                equals: "sed_sample".to_string(),
            },
            Condition {
                column: "subcores_taken".to_string(),
                equals: "yes".to_string(),
            },
        ],
        projection: survey_wrapped(&middle),
        count_column: "number_subcores".to_string(),
        id_source: "collection_GlobalID".to_string(),
        id_separator: "-SC".to_string(),
        id_column: "sample_global_id".to_string(),
        output_file: "clean_subcore_join".to_string(),
    }
}

/// The v14 survey: survey root with crew, environmental measurement,
/// collection and filter repeats.
pub fn schema() -> SurveySchema {
    SurveySchema {
        version: VERSION.to_string(),
        root: "survey".to_string(),
        tables: vec![
            survey_table(),
            crew_table(),
            envmeas_table(),
            collection_table(),
            filter_table(),
        ],
        joins: vec![crew_join(), envmeas_join(), collection_join(), filter_join()],
        expansions: vec![subcore_expansion()],
    }
}
