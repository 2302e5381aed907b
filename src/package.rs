//! Serialization of a [`Deck`] into an `.apkg` flashcard package.
//!
//! A package is a zip archive holding a SQLite collection (`collection.anki2`,
//! schema version 11) and an empty media manifest. The collection is built in
//! a scratch directory and copied into the archive once complete. The archive
//! itself is written next to the output path and renamed into place, so a
//! failed write never leaves a truncated package behind.

use crate::deck::{Deck, Model, Note};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the collection database inside the archive.
pub const COLLECTION_FILE: &str = "collection.anki2";

/// Name of the media manifest inside the archive.
pub const MEDIA_FILE: &str = "media";

/// Collection schema version understood by every current viewer.
const SCHEMA_VERSION: i64 = 11;

/// Id of the built-in default deck and its options group.
const DEFAULT_DECK_ID: i64 = 1;

/// Separator between field values in the `notes.flds` column.
const FIELD_SEPARATOR: &str = "\x1f";

/// HTML comments and tags, removed from the sort field.
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->|<.*?>").unwrap());

const SCHEMA: &str = r#"
CREATE TABLE col (
    id              integer primary key,
    crt             integer not null,
    mod             integer not null,
    scm             integer not null,
    ver             integer not null,
    dty             integer not null,
    usn             integer not null,
    ls              integer not null,
    conf            text not null,
    models          text not null,
    decks           text not null,
    dconf           text not null,
    tags            text not null
);
CREATE TABLE notes (
    id              integer primary key,
    guid            text not null,
    mid             integer not null,
    mod             integer not null,
    usn             integer not null,
    tags            text not null,
    flds            text not null,
    sfld            integer not null,
    csum            integer not null,
    flags           integer not null,
    data            text not null
);
CREATE TABLE cards (
    id              integer primary key,
    nid             integer not null,
    did             integer not null,
    ord             integer not null,
    mod             integer not null,
    usn             integer not null,
    type            integer not null,
    queue           integer not null,
    due             integer not null,
    ivl             integer not null,
    factor          integer not null,
    reps            integer not null,
    lapses          integer not null,
    left            integer not null,
    odue            integer not null,
    odid            integer not null,
    flags           integer not null,
    data            text not null
);
CREATE TABLE revlog (
    id              integer primary key,
    cid             integer not null,
    usn             integer not null,
    ease            integer not null,
    ivl             integer not null,
    lastIvl         integer not null,
    factor          integer not null,
    time            integer not null,
    type            integer not null
);
CREATE TABLE graves (
    usn             integer not null,
    oid             integer not null,
    type            integer not null
);
CREATE INDEX ix_notes_usn on notes (usn);
CREATE INDEX ix_cards_usn on cards (usn);
CREATE INDEX ix_revlog_usn on revlog (usn);
CREATE INDEX ix_cards_nid on cards (nid);
CREATE INDEX ix_cards_sched on cards (did, queue, due);
CREATE INDEX ix_revlog_cid on revlog (cid);
CREATE INDEX ix_notes_csum on notes (csum);
"#;

const LATEX_PRE: &str = "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n";

const LATEX_POST: &str = "\\end{document}";

/// Writes decks to `.apkg` files.
///
/// Every timestamp and generated row id in the collection is derived from
/// `created_at`, so the same deck and timestamp always give the same
/// database content.
pub struct PackageWriter {
    created_at: DateTime<Utc>,
}

impl PackageWriter {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self { created_at }
    }

    /// Writes `deck` as a package at `output`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch collection cannot be built or the
    /// archive cannot be written.
    pub fn write(&self, deck: &Deck, output: &Path) -> Result<()> {
        let scratch = TempDir::new().context("Failed to create temporary directory")?;
        let db_path = scratch.path().join(COLLECTION_FILE);
        log::debug!("Building collection in {}", db_path.display());

        {
            let mut conn = Connection::open(&db_path)
                .with_context(|| format!("Failed to create {}", db_path.display()))?;
            self.write_collection(&mut conn, deck)
                .context("Failed to write collection database")?;
        }

        let collection = fs::read(&db_path)
            .with_context(|| format!("Failed to read back {}", db_path.display()))?;

        let output_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staged = NamedTempFile::new_in(output_dir).with_context(|| {
            format!("Failed to create temporary package in {}", output_dir.display())
        })?;

        let mut zip = ZipWriter::new(staged);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(COLLECTION_FILE, options)?;
        zip.write_all(&collection)?;
        zip.start_file(MEDIA_FILE, options)?;
        zip.write_all(b"{}")?;
        let staged = zip
            .finish()
            .with_context(|| format!("Failed to finish package {}", output.display()))?;
        staged
            .persist(output)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move package to {}", output.display()))?;

        log::info!(
            "Wrote {} note(s) to {} ({} bytes of collection data)",
            deck.len(),
            output.display(),
            collection.len()
        );
        Ok(())
    }

    fn write_collection(&self, conn: &mut Connection, deck: &Deck) -> Result<()> {
        let secs = self.created_at.timestamp();
        let millis = self.created_at.timestamp_millis();

        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;

        tx.execute(
            "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags)
             VALUES (1, ?1, ?2, ?2, ?3, 0, 0, 0, ?4, ?5, ?6, ?7, '{}')",
            params![
                secs,
                millis,
                SCHEMA_VERSION,
                collection_conf(deck).to_string(),
                models_json(deck, secs).to_string(),
                decks_json(deck, secs).to_string(),
                dconf_json().to_string(),
            ],
        )?;

        {
            let mut insert_note = tx.prepare(
                "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
                 VALUES (?1, ?2, ?3, ?4, -1, '', ?5, ?6, ?7, 0, '')",
            )?;
            let mut insert_card = tx.prepare(
                "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor,
                                    reps, lapses, left, odue, odid, flags, data)
                 VALUES (?1, ?2, ?3, 0, ?4, -1, 0, 0, ?5, 0, 0, 0, 0, 0, 0, 0, 0, '')",
            )?;

            for (position, note) in deck.notes().iter().enumerate() {
                let row_id = millis + position as i64;
                let sort_field = sort_field(&note.question);

                insert_note.execute(params![
                    row_id,
                    note.guid(),
                    deck.model.id,
                    secs,
                    note.fields().join(FIELD_SEPARATOR),
                    sort_field,
                    field_checksum(&sort_field),
                ])?;
                insert_card.execute(params![row_id, row_id, deck.id, secs, position as i64])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// Plain-text form of a field as stored in `notes.sfld`: tags and comments
/// removed, entities decoded.
pub fn sort_field(field: &str) -> String {
    let stripped = HTML_TAG_RE.replace_all(field, "");
    ::html_escape::decode_html_entities(&stripped).trim().to_string()
}

/// Duplicate-detection checksum of a sort field: the first 32 bits of its
/// SHA-1 digest, read big-endian.
pub fn field_checksum(sort_field: &str) -> i64 {
    let digest = Sha1::digest(sort_field.as_bytes());
    i64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

fn collection_conf(deck: &Deck) -> Value {
    json!({
        "activeDecks": [DEFAULT_DECK_ID],
        "curDeck": DEFAULT_DECK_ID,
        "newSpread": 0,
        "collapseTime": 1200,
        "timeLim": 0,
        "estTimes": true,
        "dueCounts": true,
        "curModel": deck.model.id.to_string(),
        "nextPos": deck.len() + 1,
        "sortType": "noteFld",
        "sortBackwards": false,
        "addToCur": true,
    })
}

fn models_json(deck: &Deck, modified: i64) -> Value {
    let model: &Model = &deck.model;
    let fields: Vec<Value> = Model::FIELDS
        .iter()
        .enumerate()
        .map(|(ord, name)| {
            json!({
                "name": name,
                "ord": ord,
                "font": "Arial",
                "size": 20,
                "media": [],
                "rtl": false,
                "sticky": false,
            })
        })
        .collect();

    let mut models = serde_json::Map::new();
    models.insert(
        model.id.to_string(),
        json!({
            "id": model.id,
            "name": model.name,
            "type": 0,
            "mod": modified,
            "usn": -1,
            "sortf": 0,
            "did": deck.id,
            "tmpls": [{
                "name": Model::TEMPLATE_NAME,
                "ord": 0,
                "qfmt": Model::FRONT_TEMPLATE,
                "afmt": Model::BACK_TEMPLATE,
                "bqfmt": "",
                "bafmt": "",
                "did": null,
            }],
            "flds": fields,
            "css": model.css,
            "latexPre": LATEX_PRE,
            "latexPost": LATEX_POST,
            "latexsvg": false,
            "req": [[0, "any", [0]]],
            "tags": [],
            "vers": [],
        }),
    );
    Value::Object(models)
}

fn deck_entry(id: i64, name: &str, modified: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "desc": "",
        "mod": modified,
        "usn": -1,
        "conf": DEFAULT_DECK_ID,
        "dyn": 0,
        "collapsed": false,
        "extendNew": 0,
        "extendRev": 50,
        "newToday": [0, 0],
        "revToday": [0, 0],
        "lrnToday": [0, 0],
        "timeToday": [0, 0],
    })
}

fn decks_json(deck: &Deck, modified: i64) -> Value {
    let mut decks = serde_json::Map::new();
    decks.insert(
        DEFAULT_DECK_ID.to_string(),
        deck_entry(DEFAULT_DECK_ID, "Default", 0),
    );
    decks.insert(deck.id.to_string(), deck_entry(deck.id, &deck.name, modified));
    Value::Object(decks)
}

fn dconf_json() -> Value {
    json!({
        DEFAULT_DECK_ID.to_string(): {
            "id": DEFAULT_DECK_ID,
            "name": "Default",
            "mod": 0,
            "usn": 0,
            "dyn": false,
            "autoplay": true,
            "replayq": true,
            "timer": 0,
            "maxTaken": 60,
            "new": {
                "bury": true,
                "delays": [1, 10],
                "initialFactor": 2500,
                "ints": [1, 4, 7],
                "order": 1,
                "perDay": 20,
                "separate": true,
            },
            "rev": {
                "bury": true,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1,
                "maxIvl": 36500,
                "minSpace": 1,
                "perDay": 100,
            },
            "lapse": {
                "delays": [10],
                "leechAction": 0,
                "leechFails": 8,
                "minInt": 1,
                "mult": 0,
            },
        }
    })
}

/// Reads the notes of a package back, in deck order.
///
/// # Errors
///
/// Returns an error if the file is not a package with a readable collection.
pub fn read_package_notes(path: &Path) -> Result<Vec<Note>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open package {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a zip archive", path.display()))?;

    let scratch = TempDir::new().context("Failed to create temporary directory")?;
    let db_path = scratch.path().join(COLLECTION_FILE);
    {
        let mut entry = archive
            .by_name(COLLECTION_FILE)
            .with_context(|| format!("{} has no {}", path.display(), COLLECTION_FILE))?;
        let mut db_file = File::create(&db_path)?;
        std::io::copy(&mut entry, &mut db_file)?;
    }

    let conn = Connection::open(&db_path)?;
    let mut stmt = conn.prepare(
        "SELECT notes.flds FROM notes JOIN cards ON cards.nid = notes.id ORDER BY cards.due",
    )?;
    let notes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .map(|flds| -> Result<Note> {
            let flds = flds?;
            let (question, answer) = flds
                .split_once(FIELD_SEPARATOR)
                .unwrap_or((flds.as_str(), ""));
            Ok(Note::new(question, answer))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(notes)
}
