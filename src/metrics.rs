use crate::normalize::{self, format_dmy, group_name, link_id, opt_for_comparison, parse_date};
use crate::records::{Dataset, Launch, Student};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const ACCEPTED_FINALIZATION_STATUSES: &[&str] =
    &["cargado", "aprobada", "aprobado", "finalizada", "finalizado"];
pub const DEFAULT_EXCLUDED_ENROLLMENT_STATUSES: &[&str] = &[
    "baja",
    "dado de baja",
    "no seleccionado",
    "rechazado",
    "rechazada",
    "cancelado",
    "cancelada",
    "retirado",
    "retirada",
    "anulado",
    "anulada",
];
pub const SELECTED_ENROLLMENT_STATUSES: &[&str] =
    &["seleccionado", "seleccionada", "asignado", "asignada"];
pub const ONGOING_PRACTICE_STATUSES: &[&str] = &["en curso", "en proceso", "pendiente"];
pub const TERMINAL_REQUEST_STATUSES: &[&str] = &[
    "finalizada",
    "cancelada",
    "rechazada",
    "archivado",
    "realizada",
    "no se pudo concretar",
];
pub const FINALIZED_STUDENT_STATUS: &str = "finalizado";
pub const PENDING_FINALIZATION_STATUS: &str = "pendiente";
pub const DELAYED_REQUEST_DAYS: i64 = 5;
pub const NEAR_COMPLETION_HOURS: f64 = 230.0;
pub const REQUIRED_HOURS: f64 = 250.0;

pub const MONTH_LABELS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];
pub const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

pub const ORIENTATION_BUCKETS: [&str; 5] =
    ["Clinica", "Educacional", "Laboral", "Comunitaria", "Sin definir"];

#[derive(Debug, Clone)]
pub struct MetricsOptions {
    pub target_year: i32,
    pub as_of: NaiveDate,
    /// Normalized convocatoria statuses that never count as an enrollment.
    pub excluded_statuses: Vec<String>,
}

impl MetricsOptions {
    pub fn new(target_year: i32, as_of: NaiveDate) -> Self {
        Self {
            target_year,
            as_of,
            excluded_statuses: DEFAULT_EXCLUDED_ENROLLMENT_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_excluded_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_statuses = statuses
            .into_iter()
            .map(|s| normalize::for_comparison(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    fn is_excluded(&self, status: &str) -> bool {
        self.excluded_statuses.iter().any(|s| s == status)
    }
}

// ---------------------------------------------------------------------------
// Launch lookups and the date resolver chain
// ---------------------------------------------------------------------------

/// Start dates of launches, reachable by id and by name. The name maps are
/// the recovery path for records that lost their link but kept a text name.
#[derive(Debug, Default)]
pub struct LaunchIndex {
    by_id: HashMap<String, NaiveDate>,
    by_name: HashMap<String, Vec<NaiveDate>>,
    by_group: HashMap<String, Vec<NaiveDate>>,
}

impl LaunchIndex {
    pub fn build(launches: &[Launch]) -> Self {
        let mut index = LaunchIndex::default();
        for l in launches {
            let Some(date) = parse_date(l.fecha_inicio.as_deref()) else {
                continue;
            };
            index.by_id.insert(l.id.clone(), date);
            let Some(name) = l.nombre_pps.as_deref() else {
                continue;
            };
            let key = normalize::for_comparison(name);
            if key.is_empty() {
                continue;
            }
            index.by_name.entry(key).or_default().push(date);
            let group = normalize::for_comparison(&group_name(Some(name)));
            index.by_group.entry(group).or_default().push(date);
        }
        index
    }

    pub fn date_for_id(&self, id: &str) -> Option<NaiveDate> {
        self.by_id.get(id).copied()
    }

    /// Exact normalized name first, then the group (base) name. Among several
    /// candidates a date in `target_year` wins, else the first launch seen.
    pub fn date_for_name(&self, name: &str, target_year: i32) -> Option<NaiveDate> {
        let key = normalize::for_comparison(name);
        if key.is_empty() {
            return None;
        }
        if let Some(found) = self.by_name.get(&key).and_then(|c| pick_for_year(c, target_year)) {
            return Some(found);
        }
        let group = normalize::for_comparison(&group_name(Some(name)));
        self.by_group
            .get(&group)
            .and_then(|c| pick_for_year(c, target_year))
    }
}

fn pick_for_year(candidates: &[NaiveDate], target_year: i32) -> Option<NaiveDate> {
    candidates
        .iter()
        .find(|d| d.year() == target_year)
        .or_else(|| candidates.first())
        .copied()
}

/// The date-bearing fields of a convocatoria or practice.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateSource<'a> {
    pub explicit: Option<&'a str>,
    pub launch_id: Option<&'a str>,
    pub launch_name: Option<&'a str>,
}

type Resolver = fn(&DateSource<'_>, &LaunchIndex, i32) -> Option<NaiveDate>;

const RESOLVERS: [Resolver; 3] = [resolve_explicit, resolve_by_launch_id, resolve_by_launch_name];

fn resolve_explicit(src: &DateSource<'_>, _: &LaunchIndex, _: i32) -> Option<NaiveDate> {
    parse_date(src.explicit)
}

fn resolve_by_launch_id(src: &DateSource<'_>, index: &LaunchIndex, _: i32) -> Option<NaiveDate> {
    link_id(src.launch_id).and_then(|id| index.date_for_id(&id))
}

fn resolve_by_launch_name(
    src: &DateSource<'_>,
    index: &LaunchIndex,
    target_year: i32,
) -> Option<NaiveDate> {
    let name = normalize::clean_raw_value(src.launch_name);
    index.date_for_name(&name, target_year)
}

/// Effective date of a record: explicit date, then linked launch, then a
/// launch with the same name. `None` keeps the record out of year buckets.
pub fn resolve_date(src: &DateSource<'_>, index: &LaunchIndex, target_year: i32) -> Option<NaiveDate> {
    RESOLVERS
        .iter()
        .find_map(|resolve| resolve(src, index, target_year))
}

// ---------------------------------------------------------------------------
// Output model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MetricList<T> {
    pub value: i64,
    pub list: Vec<T>,
}

impl<T> MetricList<T> {
    fn counted(list: Vec<T>) -> Self {
        Self {
            value: list.len() as i64,
            list,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub id: String,
    pub legajo: String,
    pub nombre: String,
    pub orientacion: Option<String>,
}

impl From<&Student> for StudentInfo {
    fn from(s: &Student) -> Self {
        StudentInfo {
            id: s.id.clone(),
            legajo: s.legajo.clone(),
            nombre: s.nombre.clone().unwrap_or_default(),
            orientacion: s.orientacion_elegida.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FinalizationSource {
    Request,
    StudentRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedStudent {
    #[serde(flatten)]
    pub student: StudentInfo,
    pub fecha_fin: String,
    pub source: FinalizationSource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentHours {
    #[serde(flatten)]
    pub student: StudentInfo,
    pub horas: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchGroup {
    pub nombre: String,
    pub orientacion: Option<String>,
    pub cupos: i64,
    pub variants: Vec<String>,
    pub months: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthSlots {
    pub month: u32,
    pub cupos: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionLaunches {
    pub name: String,
    pub cupos: i64,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthLaunches {
    pub month: u32,
    pub month_name: String,
    pub pps_count: usize,
    pub cupos_total: i64,
    pub institutions: Vec<InstitutionLaunches>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionName {
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub id: String,
    pub nombre_alumno: String,
    pub legajo: String,
    pub institucion: String,
    pub estado: String,
    pub ultima_actualizacion: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingFinalization {
    pub id: String,
    pub estudiante_id: Option<String>,
    pub nombre: String,
    pub legajo: String,
    pub fecha_solicitud: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyEntry {
    pub nombre: String,
    pub legajo: String,
    pub institucion: String,
    pub raw_value: String,
}

/// Entry/exit months of one student inside the target year (0-based).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentTimeline {
    pub id: String,
    pub legajo: String,
    pub nombre: String,
    pub start_month: Option<u32>,
    pub end_month: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthStock {
    pub month: u32,
    pub label: String,
    pub entries: i64,
    pub exits: i64,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub target_year: i32,
    pub as_of: String,
    pub alumnos_activos: MetricList<StudentInfo>,
    pub alumnos_finalizados: MetricList<FinalizedStudent>,
    #[serde(rename = "alumnosEnPPS")]
    pub alumnos_en_pps: MetricList<StudentInfo>,
    pub alumnos_activos_sin_pps_este_ano: MetricList<StudentInfo>,
    pub proximos_a_finalizar: MetricList<StudentHours>,
    pub pps_lanzadas: MetricList<LaunchGroup>,
    pub cupos_ofrecidos: MetricList<MonthSlots>,
    pub instituciones_activas: MetricList<InstitutionName>,
    pub convenios_nuevos: MetricList<InstitutionName>,
    pub solicitudes_gestion: MetricList<RequestInfo>,
    pub alumnos_demorados: MetricList<RequestInfo>,
    pub acreditaciones_pendientes: MetricList<PendingFinalization>,
    pub occupancy_distribution: BTreeMap<String, Vec<OccupancyEntry>>,
    pub launches_by_month: Vec<MonthLaunches>,
    pub raw_students: Vec<StudentTimeline>,
    pub trend_data: Vec<MonthStock>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Finished {
    date: NaiveDate,
    source: FinalizationSource,
}

#[derive(Debug, Default)]
struct EnrollmentScan {
    start_months: HashMap<String, u32>,
    selected: HashSet<String>,
}

#[derive(Debug, Default)]
struct PracticeScan {
    in_practice: HashSet<String>,
    ongoing: HashSet<String>,
    hours: HashMap<String, f64>,
}

pub fn compute_dashboard(data: &Dataset, opts: &MetricsOptions) -> DashboardMetrics {
    let year = opts.target_year;
    let index = LaunchIndex::build(&data.launches);

    let finished = classify_finalizations(data, year);
    let enrollments = classify_enrollments(data, &index, opts);
    let mut practices = classify_practices(data, &index, year);
    practices
        .in_practice
        .extend(enrollments.selected.iter().cloned());

    let mut activos = Vec::new();
    let mut en_pps = Vec::new();
    let mut sin_pps = Vec::new();
    let mut proximos = Vec::new();
    let mut finalizados = Vec::new();
    let mut raw_students = Vec::new();

    for s in &data.students {
        let start_month = enrollments.start_months.get(&s.id).copied();
        let finish = finished.get(&s.id);

        if start_month.is_some() {
            let info = StudentInfo::from(s);
            if practices.in_practice.contains(&s.id) {
                en_pps.push(info.clone());
            } else {
                sin_pps.push(info.clone());
            }
            let horas = practices.hours.get(&s.id).copied().unwrap_or(0.0);
            let ongoing = practices.ongoing.contains(&s.id);
            if (NEAR_COMPLETION_HOURS..REQUIRED_HOURS).contains(&horas)
                || (horas >= REQUIRED_HOURS && ongoing)
            {
                proximos.push(StudentHours {
                    student: info.clone(),
                    horas,
                });
            }
            activos.push(info);
        }

        if let Some(f) = finish {
            finalizados.push(FinalizedStudent {
                student: StudentInfo::from(s),
                fecha_fin: format_dmy(f.date),
                source: f.source,
            });
        }

        if start_month.is_some() || finish.is_some() {
            raw_students.push(StudentTimeline {
                id: s.id.clone(),
                legajo: s.legajo.clone(),
                nombre: s.nombre.clone().unwrap_or_default(),
                start_month,
                end_month: finish.map(|f| f.date.month0()),
            });
        }
    }

    let launches = aggregate_launches(data, year);
    let max_month = if year == opts.as_of.year() {
        opts.as_of.month0()
    } else {
        11
    };
    let trend_data = compute_monthly_stock(&raw_students, max_month);

    let students_by_id: HashMap<&str, &Student> =
        data.students.iter().map(|s| (s.id.as_str(), s)).collect();

    DashboardMetrics {
        target_year: year,
        as_of: opts.as_of.format("%Y-%m-%d").to_string(),
        alumnos_activos: MetricList::counted(activos),
        alumnos_finalizados: MetricList::counted(finalizados),
        alumnos_en_pps: MetricList::counted(en_pps),
        alumnos_activos_sin_pps_este_ano: MetricList::counted(sin_pps),
        proximos_a_finalizar: MetricList::counted(proximos),
        pps_lanzadas: MetricList {
            value: launches.distinct_sections as i64,
            list: launches.groups,
        },
        cupos_ofrecidos: MetricList {
            value: launches.total_cupos,
            list: launches.slots_by_month,
        },
        instituciones_activas: MetricList::counted(launches.institutions),
        convenios_nuevos: MetricList::counted(new_agreements(data, year)),
        solicitudes_gestion: MetricList::counted(open_requests(data, None)),
        alumnos_demorados: MetricList::counted(open_requests(data, Some(opts.as_of))),
        acreditaciones_pendientes: MetricList::counted(pending_finalizations(
            data,
            &students_by_id,
        )),
        occupancy_distribution: occupancy_by_orientation(data, &index, &students_by_id, year),
        launches_by_month: launches.by_month,
        raw_students,
        trend_data,
    }
}

/// Primary source: accepted finalization requests submitted in the year.
/// Secondary: the student's own `Finalizado` state, for students the
/// primary source did not claim.
fn classify_finalizations(data: &Dataset, year: i32) -> HashMap<String, Finished> {
    let mut out: HashMap<String, Finished> = HashMap::new();
    for f in &data.finalizations {
        let status = opt_for_comparison(f.estado.as_deref());
        if !ACCEPTED_FINALIZATION_STATUSES.contains(&status.as_str()) {
            continue;
        }
        let Some(student_id) = link_id(f.estudiante_id.as_deref()) else {
            continue;
        };
        let Some(date) = parse_date(f.fecha_solicitud.as_deref())
            .or_else(|| parse_date(f.created_at.as_deref()))
        else {
            continue;
        };
        if date.year() != year {
            continue;
        }
        out.entry(student_id)
            .and_modify(|e| {
                if date < e.date {
                    e.date = date;
                }
            })
            .or_insert(Finished {
                date,
                source: FinalizationSource::Request,
            });
    }

    for s in &data.students {
        if out.contains_key(&s.id) {
            continue;
        }
        if opt_for_comparison(s.estado.as_deref()) != FINALIZED_STUDENT_STATUS {
            continue;
        }
        if let Some(date) = parse_date(s.fecha_finalizacion.as_deref()) {
            if date.year() == year {
                out.insert(
                    s.id.clone(),
                    Finished {
                        date,
                        source: FinalizationSource::StudentRecord,
                    },
                );
            }
        }
    }
    out
}

fn classify_enrollments(data: &Dataset, index: &LaunchIndex, opts: &MetricsOptions) -> EnrollmentScan {
    let mut scan = EnrollmentScan::default();
    for c in &data.convocatorias {
        let status = opt_for_comparison(c.estado_inscripcion.as_deref());
        if opts.is_excluded(&status) {
            continue;
        }
        let Some(student_id) = link_id(c.estudiante_id.as_deref()) else {
            continue;
        };
        let src = DateSource {
            explicit: c.fecha_inicio.as_deref(),
            launch_id: c.lanzamiento_id.as_deref(),
            launch_name: c.nombre_pps.as_deref(),
        };
        let Some(date) = resolve_date(&src, index, opts.target_year) else {
            continue;
        };
        if date.year() != opts.target_year {
            continue;
        }
        let month = date.month0();
        scan.start_months
            .entry(student_id.clone())
            .and_modify(|m| *m = (*m).min(month))
            .or_insert(month);
        if SELECTED_ENROLLMENT_STATUSES.contains(&status.as_str()) {
            scan.selected.insert(student_id);
        }
    }
    scan
}

fn classify_practices(data: &Dataset, index: &LaunchIndex, year: i32) -> PracticeScan {
    let mut scan = PracticeScan::default();
    for p in &data.practices {
        let Some(student_id) = link_id(p.estudiante_id.as_deref()) else {
            continue;
        };
        *scan.hours.entry(student_id.clone()).or_insert(0.0) += p.horas_realizadas.unwrap_or(0.0);

        let ongoing =
            ONGOING_PRACTICE_STATUSES.contains(&opt_for_comparison(p.estado.as_deref()).as_str());
        if ongoing {
            scan.ongoing.insert(student_id.clone());
        }
        let src = DateSource {
            explicit: p.fecha_inicio.as_deref(),
            launch_id: p.lanzamiento_id.as_deref(),
            launch_name: p.nombre_institucion.as_deref(),
        };
        let dated_in_year = resolve_date(&src, index, year)
            .map(|d| d.year() == year)
            .unwrap_or(false);
        if ongoing || dated_in_year {
            scan.in_practice.insert(student_id);
        }
    }
    scan
}

struct LaunchAggregate {
    distinct_sections: usize,
    total_cupos: i64,
    groups: Vec<LaunchGroup>,
    slots_by_month: Vec<MonthSlots>,
    institutions: Vec<InstitutionName>,
    by_month: Vec<MonthLaunches>,
}

#[derive(Default)]
struct MonthAccumulator {
    cupos_total: i64,
    // normalized group -> (display name, cupos, variants)
    institutions: BTreeMap<String, (String, i64, Vec<String>)>,
}

/// Launch/slot totals for the year. Several visible sections of one
/// opening ("Hospital X - Turno Mañana", "Hospital X - Turno Tarde") in the
/// same month count once; their slots still add up.
fn aggregate_launches(data: &Dataset, year: i32) -> LaunchAggregate {
    let mut sections: HashSet<(String, u32)> = HashSet::new();
    let mut total_cupos = 0i64;
    let mut groups: Vec<LaunchGroup> = Vec::new();
    let mut group_pos: HashMap<String, usize> = HashMap::new();
    let mut months: BTreeMap<u32, MonthAccumulator> = BTreeMap::new();

    for l in &data.launches {
        let Some(date) = parse_date(l.fecha_inicio.as_deref()) else {
            continue;
        };
        if date.year() != year {
            continue;
        }
        let cupos = l.cupos_disponibles.unwrap_or(0);
        let month = date.month0();
        total_cupos += cupos;
        let acc = months.entry(month).or_default();
        acc.cupos_total += cupos;

        // Unnamed launches add slots but are not an identifiable opening.
        let Some(name) = l.nombre_pps.as_deref().filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        let display = group_name(Some(name));
        let key = normalize::for_comparison(&display);
        sections.insert((key.clone(), month));

        let slot = acc
            .institutions
            .entry(key.clone())
            .or_insert_with(|| (display.clone(), 0, Vec::new()));
        slot.1 += cupos;
        slot.2.push(name.trim().to_string());

        let pos = *group_pos.entry(key).or_insert_with(|| {
            groups.push(LaunchGroup {
                nombre: display.clone(),
                orientacion: None,
                cupos: 0,
                variants: Vec::new(),
                months: Vec::new(),
            });
            groups.len() - 1
        });
        let g = &mut groups[pos];
        g.cupos += cupos;
        if g.orientacion.is_none() {
            g.orientacion = l.orientacion.clone().filter(|o| !o.trim().is_empty());
        }
        let variant = name.trim().to_string();
        if !g.variants.contains(&variant) {
            g.variants.push(variant);
        }
        if !g.months.contains(&month) {
            g.months.push(month);
        }
    }

    for g in groups.iter_mut() {
        g.months.sort_unstable();
    }

    let slots_by_month = months
        .iter()
        .map(|(m, acc)| MonthSlots {
            month: *m,
            cupos: acc.cupos_total,
        })
        .collect();

    let by_month = months
        .into_iter()
        .map(|(m, acc)| {
            let mut institutions: Vec<InstitutionLaunches> = acc
                .institutions
                .into_values()
                .map(|(name, cupos, mut variants)| {
                    variants.sort();
                    variants.dedup();
                    InstitutionLaunches {
                        name,
                        cupos,
                        variants,
                    }
                })
                .collect();
            institutions.sort_by(|a, b| a.name.cmp(&b.name));
            MonthLaunches {
                month: m,
                month_name: MONTH_NAMES[m as usize].to_string(),
                pps_count: institutions.len(),
                cupos_total: acc.cupos_total,
                institutions,
            }
        })
        .collect();

    let institutions = groups
        .iter()
        .map(|g| InstitutionName {
            nombre: g.nombre.clone(),
        })
        .collect();

    LaunchAggregate {
        distinct_sections: sections.len(),
        total_cupos,
        groups,
        slots_by_month,
        institutions,
        by_month,
    }
}

pub fn new_agreements(data: &Dataset, year: i32) -> Vec<InstitutionName> {
    let year_text = year.to_string();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for i in &data.institutions {
        let matches = i
            .convenio_nuevo
            .as_deref()
            .map(|v| v.trim() == year_text)
            .unwrap_or(false);
        let Some(name) = i.nombre.as_deref().filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        if !matches {
            continue;
        }
        let display = group_name(Some(name));
        if seen.insert(normalize::for_comparison(&display)) {
            out.push(InstitutionName { nombre: display });
        }
    }
    out
}

/// Requests still being managed. With `stale_as_of`, only those whose last
/// update is more than `DELAYED_REQUEST_DAYS` old.
fn open_requests(data: &Dataset, stale_as_of: Option<NaiveDate>) -> Vec<RequestInfo> {
    data.requests
        .iter()
        .filter(|r| {
            let status = opt_for_comparison(r.estado_seguimiento.as_deref());
            !TERMINAL_REQUEST_STATUSES.contains(&status.as_str())
        })
        .filter(|r| match stale_as_of {
            None => true,
            Some(as_of) => parse_date(r.actualizacion.as_deref())
                .or_else(|| parse_date(r.created_at.as_deref()))
                .map(|d| (as_of - d).num_days() > DELAYED_REQUEST_DAYS)
                .unwrap_or(false),
        })
        .map(|r| RequestInfo {
            id: r.id.clone(),
            nombre_alumno: normalize::clean_raw_value(r.nombre_alumno.as_deref()),
            legajo: normalize::clean_raw_value(r.legajo.as_deref()),
            institucion: normalize::clean_raw_value(r.nombre_institucion.as_deref()),
            estado: r.estado_seguimiento.clone().unwrap_or_default(),
            ultima_actualizacion: r.actualizacion.clone().or_else(|| r.created_at.clone()),
        })
        .collect()
}

fn pending_finalizations(
    data: &Dataset,
    students_by_id: &HashMap<&str, &Student>,
) -> Vec<PendingFinalization> {
    data.finalizations
        .iter()
        .filter(|f| opt_for_comparison(f.estado.as_deref()) == PENDING_FINALIZATION_STATUS)
        .map(|f| {
            let student_id = link_id(f.estudiante_id.as_deref());
            let student = student_id
                .as_deref()
                .and_then(|id| students_by_id.get(id).copied());
            PendingFinalization {
                id: f.id.clone(),
                estudiante_id: student_id.clone(),
                nombre: student
                    .and_then(|s| s.nombre.clone())
                    .unwrap_or_else(|| "Estudiante".to_string()),
                legajo: student
                    .map(|s| s.legajo.clone())
                    .unwrap_or_else(|| "---".to_string()),
                fecha_solicitud: f.fecha_solicitud.clone(),
            }
        })
        .collect()
}

pub fn orientation_bucket(raw: Option<&str>) -> &'static str {
    let n = opt_for_comparison(raw);
    if n.contains("clinica") {
        "Clinica"
    } else if n.contains("educacional") || n.contains("educacion") {
        "Educacional"
    } else if n.contains("laboral") || n.contains("trabajo") {
        "Laboral"
    } else if n.contains("comunitaria") || n.contains("comunidad") {
        "Comunitaria"
    } else {
        "Sin definir"
    }
}

fn occupancy_by_orientation(
    data: &Dataset,
    index: &LaunchIndex,
    students_by_id: &HashMap<&str, &Student>,
    year: i32,
) -> BTreeMap<String, Vec<OccupancyEntry>> {
    let launches_by_id: HashMap<&str, &Launch> =
        data.launches.iter().map(|l| (l.id.as_str(), l)).collect();
    let mut out: BTreeMap<String, Vec<OccupancyEntry>> = ORIENTATION_BUCKETS
        .iter()
        .map(|b| (b.to_string(), Vec::new()))
        .collect();

    for c in &data.convocatorias {
        let status = opt_for_comparison(c.estado_inscripcion.as_deref());
        if !SELECTED_ENROLLMENT_STATUSES.contains(&status.as_str()) {
            continue;
        }
        let src = DateSource {
            explicit: c.fecha_inicio.as_deref(),
            launch_id: c.lanzamiento_id.as_deref(),
            launch_name: c.nombre_pps.as_deref(),
        };
        if resolve_date(&src, index, year).map(|d| d.year()) != Some(year) {
            continue;
        }
        let launch = link_id(c.lanzamiento_id.as_deref())
            .and_then(|id| launches_by_id.get(id.as_str()).copied());
        let student = link_id(c.estudiante_id.as_deref())
            .and_then(|id| students_by_id.get(id.as_str()).copied());

        let orientation = launch
            .and_then(|l| l.orientacion.clone())
            .or_else(|| c.orientacion.clone())
            .filter(|o| !o.trim().is_empty());
        let entry = OccupancyEntry {
            nombre: student
                .and_then(|s| s.nombre.clone())
                .unwrap_or_else(|| "Estudiante".to_string()),
            legajo: student
                .map(|s| s.legajo.clone())
                .unwrap_or_else(|| "---".to_string()),
            institucion: launch
                .and_then(|l| l.nombre_pps.clone())
                .or_else(|| c.nombre_pps.clone())
                .unwrap_or_else(|| "N/A".to_string()),
            raw_value: orientation.clone().unwrap_or_else(|| "(Vacio)".to_string()),
        };
        out.entry(orientation_bucket(orientation.as_deref()).to_string())
            .or_default()
            .push(entry);
    }
    out
}

/// Month-by-month active stock: previous + entries - exits, never below
/// zero. Months after `max_month` are not emitted.
pub fn compute_monthly_stock(timelines: &[StudentTimeline], max_month: u32) -> Vec<MonthStock> {
    let mut entries = [0i64; 12];
    let mut exits = [0i64; 12];
    for t in timelines {
        if let Some(m) = t.start_month.filter(|m| *m < 12) {
            entries[m as usize] += 1;
        }
        if let Some(m) = t.end_month.filter(|m| *m < 12) {
            exits[m as usize] += 1;
        }
    }

    let mut stock = 0i64;
    (0..=max_month.min(11))
        .map(|m| {
            let i = m as usize;
            stock = (stock + entries[i] - exits[i]).max(0);
            MonthStock {
                month: m,
                label: MONTH_LABELS[i].to_string(),
                entries: entries[i],
                exits: exits[i],
                value: stock,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Convocatoria, FinalizationRequest, Institution, Practice, PpsRequest};

    fn student(id: &str, legajo: &str) -> Student {
        Student {
            id: id.to_string(),
            legajo: legajo.to_string(),
            nombre: Some(format!("Alumno {}", legajo)),
            ..Default::default()
        }
    }

    fn launch(id: &str, name: &str, date: &str, cupos: i64) -> Launch {
        Launch {
            id: id.to_string(),
            nombre_pps: Some(name.to_string()),
            fecha_inicio: Some(date.to_string()),
            cupos_disponibles: Some(cupos),
            ..Default::default()
        }
    }

    fn conv(id: &str, student_id: &str, status: &str) -> Convocatoria {
        Convocatoria {
            id: id.to_string(),
            estudiante_id: Some(student_id.to_string()),
            estado_inscripcion: Some(status.to_string()),
            ..Default::default()
        }
    }

    fn opts(year: i32) -> MetricsOptions {
        MetricsOptions::new(year, NaiveDate::from_ymd_opt(year, 12, 31).expect("date"))
    }

    fn ids(list: &[StudentInfo]) -> Vec<&str> {
        list.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn excluded_statuses_never_make_a_student_active() {
        let mut data = Dataset::default();
        data.students = vec![student("s1", "1"), student("s2", "2"), student("s3", "3")];
        for (i, status) in ["Baja", "No Seleccionado", "Rechazado"].iter().enumerate() {
            let mut c = conv(&format!("c{}", i), "s1", status);
            c.fecha_inicio = Some("2025-04-01".into());
            data.convocatorias.push(c);
        }
        let mut ok = conv("c9", "s2", "Inscripto");
        ok.fecha_inicio = Some("2025-04-01".into());
        data.convocatorias.push(ok);

        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(ids(&m.alumnos_activos.list), vec!["s2"]);
        assert_eq!(m.alumnos_activos.value, 1);
    }

    #[test]
    fn name_match_recovers_unlinked_convocatoria() {
        let mut data = Dataset::default();
        data.students = vec![student("s1", "1")];
        data.launches = vec![launch("l1", "Hospital X - Turno Mañana", "2025-03-10", 4)];
        let mut c = conv("c1", "s1", "Inscripto");
        c.nombre_pps = Some("  hospital x - turno MANANA ".into());
        data.convocatorias.push(c);

        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(m.alumnos_activos.value, 1);
        assert_eq!(m.raw_students[0].start_month, Some(2));
    }

    #[test]
    fn group_name_match_is_the_last_fallback() {
        let index = LaunchIndex::build(&[launch("l1", "Escuela 5 - Turno Tarde", "2024-08-01", 2)]);
        let src = DateSource {
            launch_name: Some("Escuela 5"),
            ..Default::default()
        };
        assert_eq!(
            resolve_date(&src, &index, 2024),
            NaiveDate::from_ymd_opt(2024, 8, 1)
        );
    }

    #[test]
    fn duplicate_names_prefer_target_year() {
        let index = LaunchIndex::build(&[
            launch("l1", "Hospital Y", "2024-05-01", 2),
            launch("l2", "Hospital Y", "2025-09-01", 2),
        ]);
        let src = DateSource {
            launch_name: Some("Hospital Y"),
            ..Default::default()
        };
        assert_eq!(resolve_date(&src, &index, 2025), NaiveDate::from_ymd_opt(2025, 9, 1));
        assert_eq!(resolve_date(&src, &index, 2024), NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(resolve_date(&src, &index, 2030), NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn resolver_chain_order_and_fallthrough() {
        let index = LaunchIndex::build(&[
            launch("l1", "Centro A", "2025-02-01", 1),
            launch("l2", "Centro B", "2025-06-01", 1),
        ]);
        let explicit = DateSource {
            explicit: Some("2025-11-20"),
            launch_id: Some("l1"),
            launch_name: Some("Centro B"),
        };
        assert_eq!(resolve_date(&explicit, &index, 2025), NaiveDate::from_ymd_opt(2025, 11, 20));

        let bad_explicit = DateSource {
            explicit: Some("sin fecha"),
            launch_id: Some("[\"l1\"]"),
            launch_name: Some("Centro B"),
        };
        assert_eq!(resolve_date(&bad_explicit, &index, 2025), NaiveDate::from_ymd_opt(2025, 2, 1));

        let dangling = DateSource {
            explicit: None,
            launch_id: Some("missing"),
            launch_name: Some("Centro B"),
        };
        assert_eq!(resolve_date(&dangling, &index, 2025), NaiveDate::from_ymd_opt(2025, 6, 1));

        assert_eq!(resolve_date(&DateSource::default(), &index, 2025), None);
    }

    #[test]
    fn start_month_is_earliest_qualifying_record() {
        let mut data = Dataset::default();
        data.students = vec![student("s1", "1")];
        for (id, date) in [("c1", "2025-07-01"), ("c2", "2025-03-15"), ("c3", "2024-01-10")] {
            let mut c = conv(id, "s1", "Inscripto");
            c.fecha_inicio = Some(date.into());
            data.convocatorias.push(c);
        }
        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(m.raw_students[0].start_month, Some(2));
    }

    #[test]
    fn sections_of_one_opening_count_once_per_month() {
        let mut data = Dataset::default();
        data.launches = vec![
            launch("l1", "Hospital X - Turno Mañana", "2025-03-03", 3),
            launch("l2", "Hospital X - Turno Tarde", "2025-03-20", 2),
            launch("l3", "Hospital X - Turno Tarde", "2025-08-01", 2),
            launch("l4", "Escuela 5", "2025-03-05", 1),
            launch("l5", "Hospital X", "2024-03-01", 9),
        ];
        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(m.pps_lanzadas.value, 3);
        assert_eq!(m.cupos_ofrecidos.value, 8);
        assert_eq!(m.instituciones_activas.value, 2);

        let hx = &m.pps_lanzadas.list[0];
        assert_eq!(hx.nombre, "Hospital X");
        assert_eq!(hx.cupos, 7);
        assert_eq!(hx.months, vec![2, 7]);
        assert_eq!(hx.variants.len(), 2);

        let march = &m.launches_by_month[0];
        assert_eq!(march.month_name, "Marzo");
        assert_eq!(march.pps_count, 2);
        assert_eq!(march.cupos_total, 6);
        assert_eq!(
            m.cupos_ofrecidos.list,
            vec![MonthSlots { month: 2, cupos: 6 }, MonthSlots { month: 7, cupos: 2 }]
        );
    }

    #[test]
    fn en_pps_and_sin_pps_partition_active_students() {
        let mut data = Dataset::default();
        data.students = (1..=5).map(|i| student(&format!("s{}", i), &i.to_string())).collect();
        data.launches = vec![launch("l1", "Centro A", "2025-04-01", 5)];
        for i in 1..=5 {
            let mut c = conv(&format!("c{}", i), &format!("s{}", i), "Inscripto");
            c.lanzamiento_id = Some("l1".into());
            data.convocatorias.push(c);
        }
        // s1: ongoing practice from an older year
        data.practices.push(Practice {
            id: "p1".into(),
            estudiante_id: Some("s1".into()),
            fecha_inicio: Some("2023-05-01".into()),
            estado: Some("En curso".into()),
            ..Default::default()
        });
        // s2: finished practice dated in the year
        data.practices.push(Practice {
            id: "p2".into(),
            estudiante_id: Some("s2".into()),
            fecha_inicio: Some("2025-06-01".into()),
            estado: Some("Finalizada".into()),
            ..Default::default()
        });
        // s3: old finished practice, does not count
        data.practices.push(Practice {
            id: "p3".into(),
            estudiante_id: Some("s3".into()),
            fecha_inicio: Some("2022-06-01".into()),
            estado: Some("Finalizada".into()),
            ..Default::default()
        });
        // s4: selected in a convocatoria of the year
        data.convocatorias[3].estado_inscripcion = Some("Seleccionado".into());

        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(ids(&m.alumnos_en_pps.list), vec!["s1", "s2", "s4"]);
        assert_eq!(ids(&m.alumnos_activos_sin_pps_este_ano.list), vec!["s3", "s5"]);
        assert_eq!(
            m.alumnos_en_pps.value + m.alumnos_activos_sin_pps_este_ano.value,
            m.alumnos_activos.value
        );
        let active: HashSet<&str> = ids(&m.alumnos_activos.list).into_iter().collect();
        assert!(ids(&m.alumnos_en_pps.list).iter().all(|id| active.contains(id)));
    }

    #[test]
    fn finalizations_prefer_requests_then_student_flag() {
        let mut data = Dataset::default();
        let mut s1 = student("s1", "1");
        s1.estado = Some("Finalizado".into());
        s1.fecha_finalizacion = Some("2025-12-01".into());
        let mut s2 = student("s2", "2");
        s2.estado = Some("Finalizado".into());
        s2.fecha_finalizacion = Some("2025-02-14".into());
        let mut s3 = student("s3", "3");
        s3.estado = Some("Finalizado".into());
        s3.fecha_finalizacion = Some("2024-11-01".into());
        data.students = vec![s1, s2, s3, student("s4", "4")];
        data.finalizations = vec![
            FinalizationRequest {
                id: "f1".into(),
                estudiante_id: Some("s1".into()),
                fecha_solicitud: Some("2025-06-03".into()),
                estado: Some("Cargado".into()),
                ..Default::default()
            },
            FinalizationRequest {
                id: "f2".into(),
                estudiante_id: Some("s4".into()),
                fecha_solicitud: Some("2025-05-01".into()),
                estado: Some("Pendiente".into()),
                ..Default::default()
            },
        ];

        let m = compute_dashboard(&data, &opts(2025));
        let got: Vec<(&str, &str, FinalizationSource)> = m
            .alumnos_finalizados
            .list
            .iter()
            .map(|f| (f.student.id.as_str(), f.fecha_fin.as_str(), f.source))
            .collect();
        assert_eq!(
            got,
            vec![
                ("s1", "03/06/2025", FinalizationSource::Request),
                ("s2", "14/02/2025", FinalizationSource::StudentRecord),
            ]
        );
        assert_eq!(m.acreditaciones_pendientes.value, 1);
        assert_eq!(m.acreditaciones_pendientes.list[0].legajo, "4");
    }

    #[test]
    fn unparseable_dates_and_orphans_are_silently_skipped() {
        let mut data = Dataset::default();
        data.students = vec![student("s1", "1")];
        let mut bad = conv("c1", "s1", "Inscripto");
        bad.fecha_inicio = Some("32/13/2025".into());
        let mut orphan = conv("c2", "ghost", "Inscripto");
        orphan.fecha_inicio = Some("2025-03-01".into());
        data.convocatorias = vec![bad, orphan];
        data.finalizations.push(FinalizationRequest {
            id: "f1".into(),
            estudiante_id: Some("ghost".into()),
            fecha_solicitud: Some("2025-03-01".into()),
            estado: Some("Cargado".into()),
            ..Default::default()
        });

        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(m.alumnos_activos.value, 0);
        assert_eq!(m.alumnos_finalizados.value, 0);
        assert!(m.raw_students.is_empty());
    }

    #[test]
    fn excluded_statuses_can_be_overridden() {
        let mut data = Dataset::default();
        data.students = vec![student("s1", "1")];
        let mut c = conv("c1", "s1", "En espera");
        c.fecha_inicio = Some("2025-03-01".into());
        data.convocatorias.push(c);

        let o = opts(2025).with_excluded_statuses(["En Espera"]);
        assert_eq!(compute_dashboard(&data, &o).alumnos_activos.value, 0);
        assert_eq!(compute_dashboard(&data, &opts(2025)).alumnos_activos.value, 1);
    }

    #[test]
    fn monthly_stock_is_clamped_at_zero() {
        let timelines = vec![
            StudentTimeline {
                id: "a".into(),
                legajo: "1".into(),
                nombre: String::new(),
                start_month: None,
                end_month: Some(0),
            },
            StudentTimeline {
                id: "b".into(),
                legajo: "2".into(),
                nombre: String::new(),
                start_month: Some(1),
                end_month: Some(3),
            },
            StudentTimeline {
                id: "c".into(),
                legajo: "3".into(),
                nombre: String::new(),
                start_month: Some(2),
                end_month: None,
            },
        ];
        let stock = compute_monthly_stock(&timelines, 11);
        let values: Vec<i64> = stock.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![0, 1, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1]);
        assert!(stock.iter().all(|m| m.value >= 0));
        assert_eq!(stock[0].exits, 1);
        assert_eq!(stock[0].label, "Ene");
    }

    #[test]
    fn trend_stops_at_current_month_of_current_year() {
        let mut data = Dataset::default();
        data.students = vec![student("s1", "1")];
        let mut c = conv("c1", "s1", "Inscripto");
        c.fecha_inicio = Some("2025-02-01".into());
        data.convocatorias.push(c);

        let o = MetricsOptions::new(2025, NaiveDate::from_ymd_opt(2025, 4, 15).expect("date"));
        let m = compute_dashboard(&data, &o);
        assert_eq!(m.trend_data.len(), 4);
        assert_eq!(m.trend_data[3].value, 1);
        assert_eq!(compute_dashboard(&data, &opts(2025)).trend_data.len(), 12);
    }

    #[test]
    fn near_completion_uses_total_hours() {
        let mut data = Dataset::default();
        data.students = vec![student("s1", "1"), student("s2", "2"), student("s3", "3")];
        for i in 1..=3 {
            let mut c = conv(&format!("c{}", i), &format!("s{}", i), "Inscripto");
            c.fecha_inicio = Some("2025-03-01".into());
            data.convocatorias.push(c);
        }
        let practice = |id: &str, sid: &str, horas: f64, estado: &str| Practice {
            id: id.into(),
            estudiante_id: Some(sid.into()),
            horas_realizadas: Some(horas),
            estado: Some(estado.into()),
            ..Default::default()
        };
        data.practices = vec![
            practice("p1", "s1", 120.0, "Finalizada"),
            practice("p2", "s1", 120.0, "Finalizada"),
            practice("p3", "s2", 260.0, "Finalizada"),
            practice("p4", "s3", 260.0, "En curso"),
        ];
        let m = compute_dashboard(&data, &opts(2025));
        let got: Vec<(&str, f64)> = m
            .proximos_a_finalizar
            .list
            .iter()
            .map(|p| (p.student.id.as_str(), p.horas))
            .collect();
        assert_eq!(got, vec![("s1", 240.0), ("s3", 260.0)]);
    }

    #[test]
    fn near_completion_range_is_half_open() {
        let mut data = Dataset::default();
        let hours = [(229.5, "Finalizada"), (230.0, "Finalizada"), (250.0, "Finalizada"), (250.0, "En curso")];
        for (i, (horas, estado)) in hours.iter().enumerate() {
            let sid = format!("s{}", i);
            data.students.push(student(&sid, &i.to_string()));
            let mut c = conv(&format!("c{}", i), &sid, "Inscripto");
            c.fecha_inicio = Some("2025-03-01".into());
            data.convocatorias.push(c);
            data.practices.push(Practice {
                id: format!("p{}", i),
                estudiante_id: Some(sid),
                horas_realizadas: Some(*horas),
                estado: Some((*estado).into()),
                ..Default::default()
            });
        }
        let m = compute_dashboard(&data, &opts(2025));
        let got: Vec<(&str, f64)> = m
            .proximos_a_finalizar
            .list
            .iter()
            .map(|p| (p.student.id.as_str(), p.horas))
            .collect();
        assert_eq!(got, vec![("s1", 230.0), ("s3", 250.0)]);
    }

    #[test]
    fn unnamed_launches_add_slots_but_no_institution() {
        let mut data = Dataset::default();
        let mut unnamed = launch("l2", "", "2025-04-01", 4);
        unnamed.nombre_pps = None;
        data.launches = vec![
            launch("l1", "Escuela 5", "2025-04-02", 1),
            unnamed,
            launch("l3", "   ", "2025-05-01", 2),
        ];
        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(m.cupos_ofrecidos.value, 7);
        assert_eq!(m.pps_lanzadas.value, 1);
        assert_eq!(m.instituciones_activas.value, 1);
        assert!(m
            .instituciones_activas
            .list
            .iter()
            .all(|i| i.nombre != normalize::UNNAMED_GROUP));
    }

    #[test]
    fn requests_split_into_open_and_delayed() {
        let mut data = Dataset::default();
        let req = |id: &str, estado: &str, upd: &str| PpsRequest {
            id: id.into(),
            estado_seguimiento: Some(estado.into()),
            actualizacion: Some(upd.into()),
            nombre_alumno: Some("[\"Ana\"]".into()),
            ..Default::default()
        };
        data.requests = vec![
            req("r1", "Pendiente", "2025-12-30"),
            req("r2", "En conversaciones", "2025-12-01"),
            req("r3", "Archivado", "2025-01-01"),
            req("r4", "No se pudo concretar", "2025-01-01"),
        ];
        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(m.solicitudes_gestion.value, 2);
        assert_eq!(m.alumnos_demorados.value, 1);
        assert_eq!(m.alumnos_demorados.list[0].id, "r2");
        assert_eq!(m.alumnos_demorados.list[0].nombre_alumno, "Ana");
    }

    #[test]
    fn occupancy_buckets_selected_students_by_orientation() {
        let mut data = Dataset::default();
        data.students = vec![student("s1", "1"), student("s2", "2")];
        let mut l1 = launch("l1", "Hospital X", "2025-03-01", 2);
        l1.orientacion = Some("Clínica".into());
        let mut l2 = launch("l2", "Empresa Z", "2025-03-01", 2);
        l2.orientacion = Some("Psicología del Trabajo".into());
        data.launches = vec![l1, l2];
        let mut c1 = conv("c1", "s1", "Seleccionado");
        c1.lanzamiento_id = Some("l1".into());
        let mut c2 = conv("c2", "s2", "Seleccionado");
        c2.lanzamiento_id = Some("l2".into());
        let mut c3 = conv("c3", "s2", "Inscripto");
        c3.lanzamiento_id = Some("l1".into());
        data.convocatorias = vec![c1, c2, c3];

        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(m.occupancy_distribution.len(), 5);
        assert_eq!(m.occupancy_distribution["Clinica"].len(), 1);
        assert_eq!(m.occupancy_distribution["Laboral"].len(), 1);
        assert_eq!(m.occupancy_distribution["Laboral"][0].institucion, "Empresa Z");
        assert!(m.occupancy_distribution["Sin definir"].is_empty());
    }

    #[test]
    fn new_agreements_dedupe_group_names() {
        let mut data = Dataset::default();
        let inst = |id: &str, name: &str, convenio: &str| Institution {
            id: id.into(),
            nombre: Some(name.into()),
            convenio_nuevo: Some(convenio.into()),
            ..Default::default()
        };
        data.institutions = vec![
            inst("i1", "Hospital X - Sede Norte", "2025"),
            inst("i2", "Hospital X - Sede Sur", "2025"),
            inst("i3", "Escuela 5", "2024"),
        ];
        let m = compute_dashboard(&data, &opts(2025));
        assert_eq!(m.convenios_nuevos.list, vec![InstitutionName { nombre: "Hospital X".into() }]);
    }

    #[test]
    fn wire_keys_match_dashboard_names() {
        let m = compute_dashboard(&Dataset::default(), &opts(2025));
        let v = serde_json::to_value(&m).expect("serialize");
        for key in [
            "alumnosActivos",
            "alumnosFinalizados",
            "alumnosEnPPS",
            "alumnosActivosSinPpsEsteAno",
            "ppsLanzadas",
            "cuposOfrecidos",
            "rawStudents",
            "trendData",
        ] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
    }
}
