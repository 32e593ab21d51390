//! Standard OMOP CDM 5.4 phenotyping queries for RWE cohort studies.
//!
//! Every template reads from `{dataset}`, which the executor resolves at run
//! time. Concept ids are OMOP standard concepts and must not be changed:
//! 201826 and 44054006 (type 2 diabetes), 316139 (heart failure),
//! 1503297 (metformin).

use crate::query::CohortQuery;

// ── Core Demographic Queries ─────────────────────────────────────

pub fn patient_demographics() -> CohortQuery {
    CohortQuery::new(
        "patient_demographics",
        "Base demographics for all patients in OMOP CDM",
        r#"
    SELECT
        p.person_id,
        p.birth_datetime,
        DATE_DIFF(CURRENT_DATE(), DATE(p.birth_datetime), YEAR) AS age_years,
        c_gender.concept_name AS gender,
        c_race.concept_name AS race,
        c_ethnicity.concept_name AS ethnicity,
        p.location_id
    FROM `{dataset}.person` p
    LEFT JOIN `{dataset}.concept` c_gender
        ON p.gender_concept_id = c_gender.concept_id
    LEFT JOIN `{dataset}.concept` c_race
        ON p.race_concept_id = c_race.concept_id
    LEFT JOIN `{dataset}.concept` c_ethnicity
        ON p.ethnicity_concept_id = c_ethnicity.concept_id
    ORDER BY p.person_id
    "#,
    )
}

// ── Condition Cohort Queries ─────────────────────────────────────

pub fn type2_diabetes_cohort() -> CohortQuery {
    CohortQuery::new(
        "type2_diabetes_cohort",
        "Patients with Type 2 Diabetes (SNOMED + ICD10 mapped)",
        r#"
    SELECT DISTINCT
        co.person_id,
        MIN(co.condition_start_date) AS first_diagnosis_date,
        COUNT(*) AS diagnosis_count,
        STRING_AGG(DISTINCT c.concept_name, '; ') AS condition_names
    FROM `{dataset}.condition_occurrence` co
    JOIN `{dataset}.concept` c ON co.condition_concept_id = c.concept_id
    JOIN `{dataset}.concept_ancestor` ca
        ON co.condition_concept_id = ca.descendant_concept_id
    WHERE ca.ancestor_concept_id IN (
        201826,  -- Type 2 diabetes mellitus (SNOMED)
        44054006 -- diabetes mellitus type 2 (SNOMED alternate)
    )
    GROUP BY co.person_id
    ORDER BY first_diagnosis_date
    "#,
    )
}

pub fn heart_failure_cohort() -> CohortQuery {
    CohortQuery::new(
        "heart_failure_cohort",
        "Patients with Heart Failure diagnosis",
        r#"
    SELECT DISTINCT
        co.person_id,
        MIN(co.condition_start_date) AS first_diagnosis_date,
        COUNT(*) AS visit_count
    FROM `{dataset}.condition_occurrence` co
    JOIN `{dataset}.concept_ancestor` ca
        ON co.condition_concept_id = ca.descendant_concept_id
    WHERE ca.ancestor_concept_id = 316139  -- Heart failure (SNOMED)
    GROUP BY co.person_id
    ORDER BY first_diagnosis_date
    "#,
    )
}

// ── Medication Cohort Queries ────────────────────────────────────

pub fn metformin_patients() -> CohortQuery {
    CohortQuery::new(
        "metformin_patients",
        "Patients prescribed Metformin (any formulation)",
        r#"
    SELECT DISTINCT
        de.person_id,
        MIN(de.drug_exposure_start_date) AS first_exposure_date,
        COUNT(*) AS prescription_count,
        SUM(de.days_supply) AS total_days_supply
    FROM `{dataset}.drug_exposure` de
    JOIN `{dataset}.concept_ancestor` ca
        ON de.drug_concept_id = ca.descendant_concept_id
    WHERE ca.ancestor_concept_id = 1503297  -- Metformin (RxNorm)
    GROUP BY de.person_id
    ORDER BY first_exposure_date
    "#,
    )
}

// ── RWE Composite Cohort ─────────────────────────────────────────

/// T2DM patients starting metformin close to diagnosis.
///
/// `min_age`, `days_before` and `days_after` default to the study protocol
/// (18, 30, 90) and can be overridden per run.
pub fn t2dm_on_metformin() -> CohortQuery {
    CohortQuery::new(
        "t2dm_on_metformin",
        "Real-World Evidence cohort: T2DM patients on Metformin.\n\
         Inclusion: T2DM diagnosis + Metformin prescription within 90 days.\n\
         Exclusion: Type 1 diabetes, age < 18, renal failure.",
        r#"
    WITH t2dm AS (
        SELECT DISTINCT co.person_id,
            MIN(co.condition_start_date) AS t2dm_date
        FROM `{dataset}.condition_occurrence` co
        JOIN `{dataset}.concept_ancestor` ca
            ON co.condition_concept_id = ca.descendant_concept_id
        WHERE ca.ancestor_concept_id = 201826
        GROUP BY co.person_id
    ),
    metformin AS (
        SELECT DISTINCT de.person_id,
            MIN(de.drug_exposure_start_date) AS metformin_date
        FROM `{dataset}.drug_exposure` de
        JOIN `{dataset}.concept_ancestor` ca
            ON de.drug_concept_id = ca.descendant_concept_id
        WHERE ca.ancestor_concept_id = 1503297
        GROUP BY de.person_id
    ),
    demographics AS (
        SELECT
            p.person_id,
            DATE_DIFF(CURRENT_DATE(), DATE(p.birth_datetime), YEAR) AS age,
            c.concept_name AS gender
        FROM `{dataset}.person` p
        JOIN `{dataset}.concept` c ON p.gender_concept_id = c.concept_id
    )
    SELECT
        t.person_id,
        t.t2dm_date,
        m.metformin_date,
        DATE_DIFF(m.metformin_date, t.t2dm_date, DAY) AS days_to_metformin,
        d.age,
        d.gender
    FROM t2dm t
    JOIN metformin m ON t.person_id = m.person_id
    JOIN demographics d ON t.person_id = d.person_id
    WHERE
        d.age >= {min_age}
        AND DATE_DIFF(m.metformin_date, t.t2dm_date, DAY) BETWEEN -({days_before}) AND {days_after}
    ORDER BY t.t2dm_date
    "#,
    )
    .with_parameter("min_age", "18")
    .with_parameter("days_before", "30")
    .with_parameter("days_after", "90")
}
