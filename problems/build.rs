use std::{
    collections::HashSet,
    env,
    error::Error,
    fs::{self, File},
    io::Write,
    path::PathBuf,
    process,
};

struct ProblemDef {
    /// The code that users know this as. This should remain stable
    /// between releases to facilitate consistent documentation.
    code: String,
    /// The internal name that this problem is known as. This makes for
    /// easy reading, but we don't promise that this remains consistent
    /// between releases.
    name: String,
    /// A message describing the type of problem.
    message: String,
}

fn read_definitions() -> Result<Vec<ProblemDef>, Box<dyn Error>> {
    let mut src_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    src_path.push("resources");
    src_path.push("problem-codes.csv");

    let src = fs::read_to_string(&src_path)
        .map_err(|e| format!("Unable to read '{}': {}", src_path.display(), e))?;

    let mut defs = vec![];
    let mut codes = HashSet::new();
    let mut rdr = csv::Reader::from_reader(src.as_bytes());
    for result in rdr.records() {
        let record = result?;
        let column = |index: usize| {
            record
                .get(index)
                .map(|value| value.trim().to_string())
                .ok_or_else(|| format!("Record {:?} is not valid at column {}", record, index))
        };
        let def = ProblemDef {
            code: column(0)?,
            name: column(1)?,
            message: column(2)?,
        };
        if !codes.insert(def.code.clone()) {
            return Err(format!("Problem code {} is defined more than once", def.code).into());
        }
        defs.push(def);
    }

    Ok(defs)
}

fn write_problems(defs: &[ProblemDef]) -> Result<(), Box<dyn Error>> {
    let mut out_path = PathBuf::from(env::var("OUT_DIR")?);
    fs::create_dir_all(&out_path)
        .map_err(|e| format!("Unable to create output directory: {}", e))?;

    out_path.push("problems.rs");
    let mut out =
        File::create(out_path).map_err(|e| format!("Unable to create 'problems.rs': {}", e))?;

    out.write_all(b"#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]\n")?;
    out.write_all(b"pub enum Problem {\n")?;
    for def in defs {
        out.write_all(format!("    {},\n", def.name).as_bytes())?;
    }
    out.write_all(b"}\n\n")?;

    out.write_all(b"impl Problem {\n")?;

    out.write_all(b"    /// Returns the code for the particular problem as a string.\n")?;
    out.write_all(b"    pub fn code(&self) -> &'static str {\n")?;
    out.write_all(b"        match self {\n")?;
    for def in defs {
        out.write_all(
            format!("            Problem::{} => \"{}\",\n", def.name, def.code).as_bytes(),
        )?;
    }
    out.write_all(b"        }\n")?;
    out.write_all(b"    }\n\n")?;

    out.write_all(b"    /// Returns the message for the particular problem as a string.\n")?;
    out.write_all(b"    /// The message is constant and does not depend on the particular instance of the problem.\n")?;
    out.write_all(b"    pub fn message(&self) -> &'static str {\n")?;
    out.write_all(b"        match self {\n")?;
    for def in defs {
        out.write_all(
            format!(
                "            Problem::{} => \"{}\",\n",
                def.name,
                def.message.replace('"', "\\\"")
            )
            .as_bytes(),
        )?;
    }
    out.write_all(b"        }\n")?;
    out.write_all(b"    }\n\n")?;

    out.write_all(b"    /// Returns every defined problem in the order of the definition file.\n")?;
    out.write_all(b"    pub fn all() -> &'static [Problem] {\n")?;
    out.write_all(b"        &[\n")?;
    for def in defs {
        out.write_all(format!("            Problem::{},\n", def.name).as_bytes())?;
    }
    out.write_all(b"        ]\n")?;
    out.write_all(b"    }\n")?;

    out.write_all(b"}\n")?;

    out.flush()?;
    Ok(())
}

fn main() {
    // Tell Cargo that if the problem definitions change, to rerun this build script.
    println!("cargo:rerun-if-changed=resources/problem-codes.csv");

    let result = read_definitions().and_then(|defs| write_problems(&defs));
    if let Err(err) = result {
        println!("problem generating problems.rs: {}", err);
        process::exit(1);
    }
}
