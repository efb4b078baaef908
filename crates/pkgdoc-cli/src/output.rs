//! Text rendering of documentation records and listings.

use pkgdoc_core::{DocPage, Func, IndexRecord, Package, PackageIndex};
use std::io::{self, Write};

fn indent(s: &str, n: usize) -> String {
    s.trim().replace('\n', &format!("\n{}", " ".repeat(n)))
}

fn write_decl(out: &mut impl Write, pad: &str, decl: &str, doc: &str, url: &str) -> io::Result<()> {
    let width = pad.len() + 8;
    writeln!(out, "{pad}    Decl:   {}", indent(decl, width))?;
    writeln!(out, "{pad}    Doc:    {}", indent(doc, width))?;
    writeln!(out, "{pad}    URL:    {url}")
}

fn write_func(out: &mut impl Write, pad: &str, label: &str, f: &Func) -> io::Result<()> {
    writeln!(out, "{pad}{label}:")?;
    write_decl(out, pad, &f.decl, &f.doc, &f.url)
}

/// Print every field of `pkg`, one per line, declarations last.
pub fn write_package(out: &mut impl Write, pkg: &Package) -> io::Result<()> {
    writeln!(out, "ImportPath:   {}", pkg.import_path)?;
    writeln!(out, "ProjectRoot:  {}", pkg.project_root)?;
    writeln!(out, "ProjectName:  {}", pkg.project_name)?;
    writeln!(out, "ProjectURL:   {}", pkg.project_url)?;
    writeln!(out, "Updated:      {}", pkg.updated.to_rfc3339())?;
    writeln!(out, "Etag:         {}", pkg.etag)?;
    writeln!(out, "Name:         {}", pkg.name)?;
    writeln!(out, "IsCmd:        {}", pkg.is_cmd)?;
    writeln!(out, "Synopsis:     {}", pkg.synopsis)?;
    writeln!(out, "Doc:          {}", indent(&pkg.doc, 14))?;

    writeln!(out, "Errors:")?;
    for e in &pkg.errors {
        writeln!(out, "     {e}")?;
    }
    writeln!(out, "Files:")?;
    for f in &pkg.files {
        writeln!(out, "     {} {}", f.name, f.url)?;
    }
    writeln!(out, "Imports:")?;
    for i in &pkg.imports {
        writeln!(out, "     {i}")?;
    }
    writeln!(out, "TestImports:")?;
    for i in &pkg.test_imports {
        writeln!(out, "     {i}")?;
    }

    for c in &pkg.consts {
        writeln!(out, "Const:")?;
        write_decl(out, "", &c.decl, &c.doc, &c.url)?;
    }
    for v in &pkg.vars {
        writeln!(out, "Var:")?;
        write_decl(out, "", &v.decl, &v.doc, &v.url)?;
    }
    for f in &pkg.funcs {
        write_func(out, "", "Func", f)?;
    }
    for t in &pkg.types {
        writeln!(out, "Type:")?;
        write_decl(out, "", &t.decl, &t.doc, &t.url)?;
        for f in &t.funcs {
            write_func(out, "    ", "Func", f)?;
        }
        for m in &t.methods {
            write_func(out, "    ", "Method", m)?;
        }
    }
    Ok(())
}

fn write_records(out: &mut impl Write, title: &str, records: &[IndexRecord]) -> io::Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    writeln!(out, "{title}:")?;
    for r in records {
        if r.synopsis.is_empty() {
            writeln!(out, "     {}", r.import_path)?;
        } else {
            writeln!(out, "     {}  {}", r.import_path, r.synopsis)?;
        }
    }
    Ok(())
}

/// Print a package followed by its child packages and commands.
pub fn write_page(out: &mut impl Write, page: &DocPage) -> io::Result<()> {
    write_package(out, &page.package)?;
    write_records(out, "Packages", &page.packages)?;
    write_records(out, "Commands", &page.commands)
}

/// Print the package index.
pub fn write_index(out: &mut impl Write, index: &PackageIndex) -> io::Result<()> {
    write_records(out, "Packages", &index.packages)?;
    write_records(out, "Commands", &index.commands)
}
