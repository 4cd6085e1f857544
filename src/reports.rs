use crate::metrics::{self, DashboardMetrics, MetricsOptions, MonthLaunches};
use crate::normalize::{clean_raw_value, format_dmy, link_id, parse_date};
use crate::records::{Dataset, Student};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpiPair {
    pub current: i64,
    pub previous: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleYearKpis {
    pub active_students: KpiPair,
    pub students_without_any_pps: KpiPair,
    pub new_students: KpiPair,
    pub finished_students: KpiPair,
    pub new_pps_launches: KpiPair,
    pub total_offered_spots: KpiPair,
    pub new_agreements: KpiPair,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPeriod {
    pub current: PeriodRange,
    pub previous: PeriodRange,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PpsRequestSummary {
    pub id: String,
    pub student_name: String,
    pub student_legajo: String,
    pub institution_name: String,
    pub request_date: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleYearReport {
    pub report_type: &'static str,
    pub year: i32,
    pub period: ReportPeriod,
    pub summary: String,
    pub kpis: SingleYearKpis,
    pub launches_by_month: Vec<MonthLaunches>,
    pub new_agreements_list: Vec<String>,
    pub pps_requests: Vec<PpsRequestSummary>,
}

/// Each KPI keyed by year ("2024" -> value).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparativeKpis {
    pub active_students: BTreeMap<String, i64>,
    pub students_without_any_pps: BTreeMap<String, i64>,
    pub finished_students: BTreeMap<String, i64>,
    pub new_students: BTreeMap<String, i64>,
    pub new_pps_launches: BTreeMap<String, i64>,
    pub total_offered_spots: BTreeMap<String, i64>,
    pub new_agreements: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparativeReport {
    pub report_type: &'static str,
    pub summary: String,
    pub kpis: ComparativeKpis,
    pub launches_by_month: BTreeMap<String, Vec<MonthLaunches>>,
    pub new_agreements: BTreeMap<String, Vec<String>>,
    pub pps_requests: BTreeMap<String, Vec<PpsRequestSummary>>,
}

/// The per-year figures both report shapes are assembled from.
struct YearFigures {
    metrics: DashboardMetrics,
    without_any_pps: i64,
    new_students: i64,
}

fn year_figures(data: &Dataset, year: i32, base: &MetricsOptions) -> YearFigures {
    let opts = MetricsOptions {
        target_year: year,
        ..base.clone()
    };
    let metrics = metrics::compute_dashboard(data, &opts);

    let with_any_practice: HashSet<String> = data
        .practices
        .iter()
        .filter_map(|p| link_id(p.estudiante_id.as_deref()))
        .collect();
    let without_any_pps = metrics
        .alumnos_activos
        .list
        .iter()
        .filter(|s| !with_any_practice.contains(&s.id))
        .count() as i64;

    let new_students = data
        .students
        .iter()
        .filter(|s| parse_date(s.created_at.as_deref()).map(|d| d.year()) == Some(year))
        .count() as i64;

    YearFigures {
        metrics,
        without_any_pps,
        new_students,
    }
}

fn pair(current: i64, previous: i64) -> KpiPair {
    KpiPair { current, previous }
}

fn year_bounds(year: i32) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN);
    let end = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX);
    (start, end)
}

pub fn single_year(data: &Dataset, year: i32, base: &MetricsOptions) -> SingleYearReport {
    let prev_year = year.saturating_sub(1);
    let cur = year_figures(data, year, base);
    let prev = year_figures(data, prev_year, base);

    let (start, end) = year_bounds(year);
    let (prev_start, prev_end) = year_bounds(prev_year);
    let m = &cur.metrics;
    let p = &prev.metrics;

    SingleYearReport {
        report_type: "singleYear",
        year,
        period: ReportPeriod {
            current: PeriodRange {
                start: format_dmy(start),
                end: format_dmy(end),
            },
            previous: PeriodRange {
                start: format_dmy(prev_start),
                end: format_dmy(prev_end),
            },
        },
        summary: format!("Balance del ciclo {}.", year),
        kpis: SingleYearKpis {
            active_students: pair(m.alumnos_activos.value, p.alumnos_activos.value),
            students_without_any_pps: pair(cur.without_any_pps, prev.without_any_pps),
            new_students: pair(cur.new_students, prev.new_students),
            finished_students: pair(m.alumnos_finalizados.value, p.alumnos_finalizados.value),
            new_pps_launches: pair(m.pps_lanzadas.value, p.pps_lanzadas.value),
            total_offered_spots: pair(m.cupos_ofrecidos.value, p.cupos_ofrecidos.value),
            new_agreements: pair(m.convenios_nuevos.value, p.convenios_nuevos.value),
        },
        launches_by_month: m.launches_by_month.clone(),
        new_agreements_list: m
            .convenios_nuevos
            .list
            .iter()
            .map(|i| i.nombre.clone())
            .collect(),
        pps_requests: requests_for_year(data, year),
    }
}

pub fn comparative(data: &Dataset, year_a: i32, year_b: i32, base: &MetricsOptions) -> ComparativeReport {
    let reports = [single_year(data, year_a, base), single_year(data, year_b, base)];

    let by_year = |pick: fn(&SingleYearKpis) -> KpiPair| -> BTreeMap<String, i64> {
        reports
            .iter()
            .map(|r| (r.year.to_string(), pick(&r.kpis).current))
            .collect()
    };

    let kpis = ComparativeKpis {
        active_students: by_year(|k| k.active_students),
        students_without_any_pps: by_year(|k| k.students_without_any_pps),
        finished_students: by_year(|k| k.finished_students),
        new_students: by_year(|k| k.new_students),
        new_pps_launches: by_year(|k| k.new_pps_launches),
        total_offered_spots: by_year(|k| k.total_offered_spots),
        new_agreements: by_year(|k| k.new_agreements),
    };

    let mut launches_by_month = BTreeMap::new();
    let mut new_agreements = BTreeMap::new();
    let mut pps_requests = BTreeMap::new();
    for r in reports {
        let key = r.year.to_string();
        launches_by_month.insert(key.clone(), r.launches_by_month);
        new_agreements.insert(key.clone(), r.new_agreements_list);
        pps_requests.insert(key, r.pps_requests);
    }

    ComparativeReport {
        report_type: "comparative",
        summary: format!(
            "Comparación de métricas clave entre los ciclos {} y {}.",
            year_a, year_b
        ),
        kpis,
        launches_by_month,
        new_agreements,
        pps_requests,
    }
}

/// Requests created in `year`. Student name/legajo come from the linked
/// student when it exists, else from the request's own text.
pub fn requests_for_year(data: &Dataset, year: i32) -> Vec<PpsRequestSummary> {
    let students: HashMap<&str, &Student> =
        data.students.iter().map(|s| (s.id.as_str(), s)).collect();

    let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

    data.requests
        .iter()
        .filter_map(|r| {
            let created = parse_date(r.created_at.as_deref())?;
            if created.year() != year {
                return None;
            }
            let student = link_id(r.estudiante_id.as_deref())
                .and_then(|id| students.get(id.as_str()).copied());
            let student_name = student
                .and_then(|s| s.nombre.clone())
                .filter(|n| !n.trim().is_empty())
                .or_else(|| non_empty(clean_raw_value(r.nombre_alumno.as_deref())))
                .unwrap_or_else(|| "Desconocido".to_string());
            let student_legajo = student
                .map(|s| s.legajo.clone())
                .or_else(|| non_empty(clean_raw_value(r.legajo.as_deref())))
                .unwrap_or_else(|| "---".to_string());
            Some(PpsRequestSummary {
                id: r.id.clone(),
                student_name,
                student_legajo,
                institution_name: non_empty(clean_raw_value(r.nombre_institucion.as_deref()))
                    .unwrap_or_else(|| "Institución desconocida".to_string()),
                request_date: Some(format_dmy(created)),
                status: r
                    .estado_seguimiento
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "Pendiente".to_string()),
            })
        })
        .collect()
}
