//! Print the logical structure tree of a tagged PDF

use std::env;
use std::process;
use std::time::Instant;
use tagged_pdf::{ParentEntry, TaggedPdf};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file>", args[0]);
        eprintln!("       {} <pdf_file> --no-outline", args[0]);
        process::exit(1);
    }

    let pdf_path = &args[1];
    let show_outline = args.get(2).map(|a| a != "--no-outline").unwrap_or(true);

    let start = Instant::now();
    let pdf = match TaggedPdf::load(pdf_path) {
        Ok(pdf) => pdf,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let elapsed = start.elapsed();

    println!("File: {}", pdf_path);
    println!("Pages: {}", pdf.page_count());
    if let Some(version) = pdf.version() {
        println!("Version: {}", version);
    }
    match pdf.mark_info() {
        Some(info) => println!(
            "MarkInfo: marked={} suspects={} user_properties={}",
            info.marked, info.suspects, info.user_properties
        ),
        None => println!("MarkInfo: none"),
    }
    println!("Annotatable: {}", pdf.can_annotate());

    let Some(tree) = pdf.struct_tree() else {
        println!("No structure tree");
        process::exit(2);
    };
    println!(
        "Structure: {} nodes, {} role mappings, {} attribute classes",
        tree.len(),
        tree.role_map().len(),
        tree.class_map().map(|c| c.len()).unwrap_or(0)
    );
    println!("Parsed in {}ms", elapsed.as_millis());
    if show_outline {
        println!();
        print!("{}", tree);
    }

    println!();
    println!("Parent tree");
    println!("===========");
    let Some(index) = tree.parent_index() else {
        println!("(none)");
        return;
    };
    for (page, info) in pdf.pages().iter().enumerate() {
        let Some(key) = info.struct_parents else {
            println!("page {}: no StructParents", page + 1);
            continue;
        };
        match index.get(key) {
            Some(ParentEntry::MarkedContent(parents)) => {
                let missing = parents.iter().filter(|p| p.is_none()).count();
                println!(
                    "page {}: key {} -> {} MCIDs ({} null)",
                    page + 1,
                    key,
                    parents.len(),
                    missing
                );
            }
            Some(ParentEntry::Object(id)) => {
                println!("page {}: key {} -> object {} {}", page + 1, key, id.0, id.1)
            }
            None => println!("page {}: key {} missing", page + 1, key),
        }
    }
}
