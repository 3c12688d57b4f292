//! Saving and loading named regions.
//!
//! Regions are stored as JSON, under a caller chosen child key:
//! ```text
//! { "<child>" : { "<name>" : { "A" : [[...], ...], "b" : [...] }, ... } }
//! ```
//! Keys are written in sorted order, and numbers use the shortest representation that reads
//! back to the same `f64`, so a saved map loads back identical.

use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::{DMatrix,DVector};
use serde::{Deserialize,Serialize};
use tracing::debug;

use crate::error::{Error,Result};
use crate::geometry::HPolyhedron;

#[derive(Serialize,Deserialize)]
struct RegionRecord {
    #[serde(rename = "A")]
    a : Vec<Vec<f64>>,
    b : Vec<f64>,
}

impl From<&HPolyhedron> for RegionRecord {
    fn from(h : &HPolyhedron) -> RegionRecord {
        RegionRecord{
            a : h.A().row_iter().map(|r| r.iter().cloned().collect()).collect(),
            b : h.b().iter().cloned().collect(),
        }
    }
}

impl RegionRecord {
    fn into_hpolyhedron(self, name : &str) -> Result<HPolyhedron> {
        let m = self.a.len();
        let n = self.a.first().map(|r| r.len()).unwrap_or(0);
        if self.a.iter().any(|r| r.len() != n) {
            return Err(Error::invalid(format!("region '{}': rows of A have different lengths",name)));
        }
        if self.b.len() != m {
            return Err(Error::invalid(format!("region '{}': A has {} rows but b has {} entries",name,m,self.b.len())));
        }
        let a = DMatrix::from_fn(m,n,|i,j| self.a[i][j]);
        HPolyhedron::new(a,DVector::from_vec(self.b))
    }
}

/// Write `regions` to `path` under the key `child_name`, replacing the file.
pub fn save_iris_regions_json_file<P : AsRef<Path>>(path : P, regions : &BTreeMap<String,HPolyhedron>, child_name : &str) -> Result<()> {
    let records : BTreeMap<&str,RegionRecord> = regions.iter().map(|(k,h)| (k.as_str(),RegionRecord::from(h))).collect();
    let mut root = BTreeMap::new();
    root.insert(child_name,records);
    let json = serde_json::to_string_pretty(&root)?;
    std::fs::write(path.as_ref(),json)?;
    debug!(path = %path.as_ref().display(), regions = regions.len(), "saved regions");
    Ok(())
}

/// Read the regions stored under `child_name` in `path`.
pub fn load_iris_regions_json_file<P : AsRef<Path>>(path : P, child_name : &str) -> Result<BTreeMap<String,HPolyhedron>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let mut root : BTreeMap<String,BTreeMap<String,RegionRecord>> = serde_json::from_str(&contents)?;
    let records = root.remove(child_name)
        .ok_or_else(|| Error::invalid(format!("{} has no entry '{}'",path.as_ref().display(),child_name)))?;
    records.into_iter()
        .map(|(name,r)| r.into_hpolyhedron(&name).map(|h| (name,h)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn tmpfile(name : &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("convexsets-{}-{}.json",name,std::process::id()))
    }

    #[test]
    fn round_trip() {
        let mut regions = BTreeMap::new();
        regions.insert("box".to_string(),HPolyhedron::make_unit_box(3));
        regions.insert("thin".to_string(),HPolyhedron::new(DMatrix::from_row_slice(2,2,&[0.1,1.0/3.0, -1e-17,2.0]),
                                                           DVector::from_vec(vec![std::f64::consts::PI,1e300])).unwrap());
        let path = tmpfile("roundtrip");
        save_iris_regions_json_file(&path,&regions,"regions").unwrap();
        let loaded = load_iris_regions_json_file(&path,"regions").unwrap();
        assert_eq!(loaded.len(),2);
        for (k,h) in regions.iter() {
            assert_eq!(loaded[k].A(),h.A());
            assert_eq!(loaded[k].b(),h.b());
        }
        assert!(load_iris_regions_json_file(&path,"other").is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn sorted_keys() {
        let mut regions = BTreeMap::new();
        regions.insert("zeta".to_string(),HPolyhedron::make_unit_box(1));
        regions.insert("alpha".to_string(),HPolyhedron::make_unit_box(1));
        let path = tmpfile("sorted");
        save_iris_regions_json_file(&path,&regions,"child").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let alpha = text.find("alpha").unwrap();
        let zeta = text.find("zeta").unwrap();
        assert!(alpha < zeta);
        assert!(text.contains("\"A\""));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed() {
        let path = tmpfile("malformed");
        std::fs::write(&path,r#"{ "c" : { "r" : { "A" : [[1.0,0.0],[1.0]], "b" : [1.0,2.0] } } }"#).unwrap();
        assert!(matches!(load_iris_regions_json_file(&path,"c"),Err(Error::InvalidArgument(_))));
        std::fs::write(&path,"not json").unwrap();
        assert!(matches!(load_iris_regions_json_file(&path,"c"),Err(Error::Serialization(_))));
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(load_iris_regions_json_file(&path,"c"),Err(Error::Io(_))));
    }
}
