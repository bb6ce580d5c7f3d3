use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::tempdir;

use adcom_etl::config::EtlConfig;
use adcom_etl::pipeline::Etl;

/// Write the fixture extracts using the production file names so the
/// default config resolves them.
fn write_fixtures(src: &Path) -> Result<()> {
    fs::write(
        src.join("2023_uni_information.csv"),
        "UnitID,Institution Name,Control of institution,Level of institution,\
Carnegie Classification 2021: Basic,Institution internet website address,\
Admissions office web address,Online application web address,Financial aid office web address\n\
100654,Bates College,Private not-for-profit,Four or more years,Baccalaureate Colleges,\
www.bates.edu,www.bates.edu/admission,www.bates.edu/apply,www.bates.edu/aid\n\
100724,Åbo College,Public,Four or more years,Baccalaureate Colleges,www.abo.edu,,,\n\
100999,,Public,Four or more years,,,,,\n\
,Ghost College,Public,Four or more years,,,,,\n",
    )?;

    fs::write(
        src.join("MERGED2022_23_PP.csv"),
        "UNITID,CITY,STABBR,INSTURL,ADMURL,TUITIONFEE_IN,TUITIONFEE_OUT\n\
100724,Turku,ME,,,,\n\
100654,Lewiston,ME,www.bates.edu,www.bates.edu/admission,61000,61000\n",
    )?;

    fs::write(
        src.join("2022_Admissions_Enrollment_Graduation.csv"),
        "UnitID,Applicants total,Admissions total,Enrolled total,Percent admitted - total,Full-time retention rate\n\
100654,900,110,95,12.4,91.2\n\
100724,450,380,120,84.4,77.6\n",
    )?;

    fs::write(
        src.join("2023_Admissions_Enrollment_Graduation.csv"),
        "UnitID,Applicants total,Admissions total,Enrolled total,\
Graduation rate - Bachelor degree within 6 years - total,Full-time retention rate,\
Student-to-faculty ratio,Total enrollment,\
Secondary school GPA,Recommendations,Admission test scores\n\
100654,1000,100,55,88.7,92.3,10.4,1800,Required to be considered,Considered but not required,Required\n\
100724,500,400,130,61.2,78.1,15.8,3400,Considered but not required,Not considered,Considered but not required\n",
    )?;

    fs::write(
        src.join("2023_tuition.csv"),
        "UnitID,DRVIC2023.Tuition and fees 2020-21,DRVIC2023.Tuition and fees 2021-22,\
DRVIC2023.Tuition and fees 2022-23,DRVIC2023.Tuition and fees 2023-24\n\
100654,52000,53000,54000,54790\n\
100724,9000,9200,9400,9600\n",
    )?;

    fs::write(
        src.join("2023 - degree offerings coded.csv"),
        "UNITID,CIPCODE,CIPTITLE,CTOTALT\n\
100654,11.0701,'Computer Science',90\n\
100654,14.0801,Civil Engineering,40\n\
100654,26.0101,Biology,40\n\
100654,52.0201,Business Administration,30\n\
100654,42.0101,Psychology,20\n\
100654,99.0101,Unclassified,999\n\
100724,54.0101,History,12\n",
    )?;

    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Every artifact content keyed by relative path, for idempotence checks.
fn snapshot_outputs(dir: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut snapshot = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let key = path.strip_prefix(dir)?.to_string_lossy().to_string();
                snapshot.insert(key, fs::read(&path)?);
            }
        }
    }
    Ok(snapshot)
}

#[test]
fn full_run_produces_consistent_artifacts() -> Result<()> {
    let dirs = tempdir()?;
    let src = dirs.path().join("src");
    let out = dirs.path().join("out");
    fs::create_dir_all(&src)?;
    write_fixtures(&src)?;

    let etl = Etl {
        src_dir: src.clone(),
        out_dir: out.clone(),
        config: EtlConfig::default(),
    };
    let summary = etl.run()?;

    assert_eq!(summary.institutions, 2);
    assert_eq!(summary.rejected_records, 2);
    assert_eq!(summary.shards, 2);

    // canonical collection
    let institutions = read_json(&out.join("institutions.json"))?;
    let institutions = institutions.as_array().unwrap();
    assert_eq!(institutions.len(), 2);

    let bates = institutions
        .iter()
        .find(|r| r["unitid"] == 100654)
        .unwrap();
    // derived admit rate: 100 admits of 1000 applicants, no rate column in 2023
    assert_eq!(bates["acceptance_rate"], 10);
    assert_eq!(bates["yield"], 55);
    assert_eq!(bates["test_policy"], "Required");
    assert_eq!(bates["control"], "Private nonprofit");
    assert_eq!(bates["state"], "ME");
    assert_eq!(bates["tuition_2023_24"], 54790.0);
    assert_eq!(bates["tuition_2023_24_in_state"], 61000.0);
    assert_eq!(bates["website"], "https://www.bates.edu/");
    assert_eq!(bates["application_url"], "https://www.bates.edu/apply");
    // top-4 families by headcount, ties kept in input order
    assert_eq!(
        bates["major_families"],
        serde_json::json!([
            "Computer & Information Sciences",
            "Engineering",
            "Biological & Biomedical Sciences",
            "Business, Management & Marketing"
        ])
    );

    let abo = institutions.iter().find(|r| r["unitid"] == 100724).unwrap();
    assert_eq!(abo["test_policy"], "Test flexible");
    // no merged tuition split for this institution
    assert!(abo["tuition_2023_24_in_state"].is_null());

    // sharding: non-ASCII leading letter buckets to misc
    let manifest = read_json(&out.join("indexes/manifest.json"))?;
    assert_eq!(manifest, serde_json::json!(["b", "misc"]));
    let misc = read_json(&out.join("indexes/misc.json"))?;
    assert_eq!(misc.as_array().unwrap()[0]["unitid"], 100724);
    let b = read_json(&out.join("indexes/b.json"))?;
    assert_eq!(b.as_array().unwrap()[0]["name"], "Bates College");

    // round-trip: detail and metrics files exist for exactly the canonical ids
    let mut detail_ids: Vec<String> = fs::read_dir(out.join("institutions"))?
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    detail_ids.sort();
    assert_eq!(detail_ids, vec!["100654.json", "100724.json"]);
    let mut metric_ids: Vec<String> = fs::read_dir(out.join("metrics"))?
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    metric_ids.sort();
    assert_eq!(metric_ids, detail_ids);

    // detail payload shape
    let detail = read_json(&out.join("institutions/100654.json"))?;
    assert_eq!(detail["profile"]["tuition_summary"]["sticker"], 54790.0);
    assert_eq!(detail["profile"]["outcomes"]["acceptance_rate"], 10);
    assert!(detail["requirements"]["required"]
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l == "Admission Test Scores"));
    assert!(detail["support_notes"]["scholarships"].is_null());

    // metrics file carries both years in order, with 2022's own rate kept
    let metrics = read_json(&out.join("metrics/100654.json"))?;
    let rows = metrics["metrics"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["year"], 2022);
    assert_eq!(rows[0]["percent_admitted_total"], 12);
    assert_eq!(rows[1]["year"], 2023);
    // estimated counts derive from the rounded rates
    assert_eq!(rows[1]["admitted_est"], 100);
    let tuition_rows = metrics["tuition"].as_array().unwrap();
    assert_eq!(tuition_rows.len(), 4);
    assert_eq!(tuition_rows[0]["tuition_year"], "2020_21");

    // catalog supplements
    let majors_meta = read_json(&out.join("majors_meta.json"))?;
    assert_eq!(majors_meta["six_digit"]["11.0701"], "Computer Science");
    let by_inst = read_json(&out.join("majors_by_institution.json"))?;
    assert!(by_inst["100654"]["six_digit"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c == "99.0101"));

    Ok(())
}

#[test]
fn reruns_over_identical_input_are_byte_identical() -> Result<()> {
    let dirs = tempdir()?;
    let src = dirs.path().join("src");
    let out = dirs.path().join("out");
    fs::create_dir_all(&src)?;
    write_fixtures(&src)?;

    let etl = Etl {
        src_dir: src.clone(),
        out_dir: out.clone(),
        config: EtlConfig::default(),
    };
    etl.run()?;
    let first = snapshot_outputs(&out)?;
    etl.run()?;
    let second = snapshot_outputs(&out)?;

    assert_eq!(first.len(), second.len());
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn a_missing_extract_aborts_before_any_output() -> Result<()> {
    let dirs = tempdir()?;
    let src = dirs.path().join("src");
    let out = dirs.path().join("out");
    fs::create_dir_all(&src)?;
    // no fixtures at all

    let etl = Etl {
        src_dir: src,
        out_dir: out.clone(),
        config: EtlConfig::default(),
    };
    assert!(etl.run().is_err());
    assert!(!out.exists());
    Ok(())
}
