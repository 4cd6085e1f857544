mod test_support;

use serde_json::json;
use test_support::{create_row, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn students_crud_pagination_filters_and_search() {
    let workspace = temp_dir("practicasd-records-crud");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let people = [
        ("1001", "Ana Pérez", "Activo"),
        ("1002", "Bruno Díaz", "Activo"),
        ("1003", "Carla Gómez", "Finalizado"),
        ("1004", "Diego Luna", "Activo"),
        ("1005", "Elena Ríos", "Activo"),
    ];
    let mut ids = Vec::new();
    for (i, (legajo, nombre, estado)) in people.iter().enumerate() {
        ids.push(create_row(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "students",
            json!({ "legajo": legajo, "nombre": nombre, "estado": estado, "correo": format!("{}@uni.test", legajo) }),
        ));
    }

    let page = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.list",
        json!({ "page": 2, "pageSize": 2, "sortBy": "legajo", "sortDir": "asc" }),
    );
    assert_eq!(page["total"], 5);
    assert_eq!(page["page"], 2);
    assert_eq!(page["pageSize"], 2);
    let legajos: Vec<&str> = page["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|r| r["legajo"].as_str())
        .collect();
    assert_eq!(legajos, vec!["1003", "1004"]);

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.list",
        json!({ "filters": { "estado": "Activo" }, "sortBy": "legajo", "sortDir": "desc" }),
    );
    assert_eq!(filtered["total"], 4);
    assert_eq!(filtered["rows"][0]["legajo"], "1005");

    let searched = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.list",
        json!({ "search": "luna" }),
    );
    assert_eq!(searched["total"], 1);
    assert_eq!(searched["rows"][0]["nombre"], "Diego Luna");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.update",
        json!({ "id": ids[0], "patch": { "estado": "Finalizado", "fecha_finalizacion": "2025-07-01" } }),
    );
    assert_eq!(updated["row"]["estado"], "Finalizado");

    let got = request_ok(&mut stdin, &mut reader, "6", "students.get", json!({ "id": ids[0] }));
    assert_eq!(got["row"]["fecha_finalizacion"], "2025-07-01");

    let found = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.findByLegajo",
        json!({ "legajo": " 1002 " }),
    );
    assert_eq!(found["row"]["nombre"], "Bruno Díaz");

    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "auth.resolveLegajo",
        json!({ "legajo": "1004" }),
    );
    assert_eq!(resolved["studentId"], ids[3].as_str());
    assert_eq!(resolved["correo"], "1004@uni.test");

    let _ = request_ok(&mut stdin, &mut reader, "9", "students.delete", json!({ "id": ids[4] }));
    let after = request_ok(&mut stdin, &mut reader, "10", "students.list", json!({}));
    assert_eq!(after["total"], 4);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn repository_errors_map_to_envelope_codes() {
    let workspace = temp_dir("practicasd-records-errors");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = create_row(&mut stdin, &mut reader, "2", "students", json!({ "legajo": "2001" }));

    let cases = [
        ("students.create", json!({ "values": { "legajo": "2001" } }), "conflict"),
        ("students.create", json!({ "values": { "nombre": "Sin legajo" } }), "bad_params"),
        ("students.create", json!({ "values": { "legajo": "2002", "apodo": "x" } }), "bad_params"),
        ("students.list", json!({ "pageSize": 501 }), "bad_params"),
        ("students.list", json!({ "page": 0 }), "bad_params"),
        ("students.list", json!({ "page": u64::MAX }), "bad_params"),
        ("students.list", json!({ "page": -3 }), "bad_params"),
        ("launches.list", json!({ "page": u64::MAX / 2, "pageSize": 500 }), "bad_params"),
        ("students.list", json!({ "pageSize": 0 }), "bad_params"),
        ("students.list", json!({ "sortBy": "apodo" }), "bad_params"),
        ("students.get", json!({ "id": "missing" }), "not_found"),
        ("students.update", json!({ "id": "missing", "patch": { "nombre": "x" } }), "not_found"),
        ("students.delete", json!({ "id": "missing" }), "not_found"),
        ("students.get", json!({}), "bad_params"),
        ("auth.resolveLegajo", json!({ "legajo": "9999" }), "not_found"),
        ("auth.resolveLegajo", json!({ "legajo": "2001" }), "no_email"),
    ];
    for (i, (method, params, code)) in cases.into_iter().enumerate() {
        let got = request_err(&mut stdin, &mut reader, &format!("e{}", i), method, params);
        assert_eq!(got, code, "{}", method);
    }

    let health = request_ok(&mut stdin, &mut reader, "alive", "health", json!({}));
    assert!(health["workspacePath"].is_string());

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn launches_and_convocatorias_accept_loose_links() {
    let workspace = temp_dir("practicasd-records-links");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let launch_id = create_row(
        &mut stdin,
        &mut reader,
        "2",
        "launches",
        json!({ "nombre_pps": "Hospital X - Turno Mañana", "fecha_inicio": "2025-03-10", "cupos_disponibles": "4" }),
    );
    let _ = create_row(
        &mut stdin,
        &mut reader,
        "3",
        "convocatorias",
        json!({ "lanzamiento_id": [launch_id], "estudiante_id": "s1", "estado_inscripcion": "Inscripto" }),
    );

    let launches = request_ok(&mut stdin, &mut reader, "4", "launches.list", json!({}));
    assert_eq!(launches["rows"][0]["cupos_disponibles"], 4);

    let convs = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "convocatorias.list",
        json!({ "filters": { "estudiante_id": "s1" } }),
    );
    assert_eq!(convs["total"], 1);
    let link = convs["rows"][0]["lanzamiento_id"].as_str().expect("link text");
    assert!(link.contains(launch_id.as_str()));

    let _ = std::fs::remove_dir_all(workspace);
}
