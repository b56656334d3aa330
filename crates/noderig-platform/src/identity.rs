use std::path::{Path, PathBuf};

use noderig_backend::{Identity, ProvisionError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PasswdEntry {
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

fn lookup_error(kind: &str, identity: &Identity) -> ProvisionError {
    ProvisionError::Io {
        kind: std::io::ErrorKind::NotFound,
        message: format!("unknown {kind} '{identity}'"),
    }
}

pub(crate) fn find_passwd_entry(passwd: &str, user: &Identity) -> Option<PasswdEntry> {
    passwd.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 6 {
            return None;
        }
        let uid: u32 = fields[2].parse().ok()?;
        let gid: u32 = fields[3].parse().ok()?;
        let matches = match user {
            Identity::Id(id) => *id == uid,
            Identity::Name(name) => fields[0] == name,
        };
        matches.then(|| PasswdEntry {
            uid,
            gid,
            home: PathBuf::from(fields[5]),
        })
    })
}

pub(crate) fn find_group_id(groups: &str, group: &Identity) -> Option<u32> {
    if let Identity::Id(id) = group {
        return Some(*id);
    }
    groups.lines().find_map(|line| {
        let mut fields = line.split(':');
        let name = fields.next()?;
        let gid = fields.nth(1)?;
        match group {
            Identity::Name(wanted) if wanted == name => gid.parse().ok(),
            _ => None,
        }
    })
}

fn read_database(path: &Path) -> Result<String, ProvisionError> {
    std::fs::read_to_string(path).map_err(ProvisionError::from)
}

/// Resolve a user against `/etc/passwd`.
pub(crate) fn resolve_user(user: &Identity) -> Result<PasswdEntry, ProvisionError> {
    let passwd = read_database(Path::new("/etc/passwd"))?;
    find_passwd_entry(&passwd, user).ok_or_else(|| lookup_error("user", user))
}

/// Resolve a group against `/etc/group`.
pub(crate) fn resolve_group(group: &Identity) -> Result<u32, ProvisionError> {
    if let Identity::Id(id) = group {
        return Ok(*id);
    }
    let groups = read_database(Path::new("/etc/group"))?;
    find_group_id(&groups, group).ok_or_else(|| lookup_error("group", group))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n\
                          deploy:x:1001:1002:Deploy:/home/deploy:/bin/sh\n\
                          broken-line\n";
    const GROUP: &str = "root:x:0:\nwww-data:x:33:\ndeploy:x:1002:deploy\n";

    #[test]
    fn passwd_lookup_by_name() {
        let entry = find_passwd_entry(PASSWD, &Identity::Name("deploy".to_string()))
            .expect("deploy should be found");
        assert_eq!(entry.uid, 1001);
        assert_eq!(entry.gid, 1002);
        assert_eq!(entry.home, PathBuf::from("/home/deploy"));
    }

    #[test]
    fn passwd_lookup_by_id() {
        let entry = find_passwd_entry(PASSWD, &Identity::Id(0)).expect("root should be found");
        assert_eq!(entry.home, PathBuf::from("/root"));
    }

    #[test]
    fn passwd_lookup_misses_unknown_user() {
        assert!(find_passwd_entry(PASSWD, &Identity::Name("nobody".to_string())).is_none());
    }

    #[test]
    fn passwd_lookup_skips_entry_with_bad_gid() {
        let passwd = "deploy:x:1001:staff:Deploy:/home/deploy:/bin/sh\n\
                      deploy:x:1001:1002:Deploy:/srv/deploy:/bin/sh\n";

        let entry = find_passwd_entry(passwd, &Identity::Name("deploy".to_string()))
            .expect("well-formed deploy entry should be found");
        assert_eq!(entry.gid, 1002);
        assert_eq!(entry.home, PathBuf::from("/srv/deploy"));

        assert!(find_passwd_entry(
            "svc:x:901::Service:/var/lib/svc:/bin/false\n",
            &Identity::Id(901)
        )
        .is_none());
    }

    #[test]
    fn group_lookup_by_name_and_id() {
        assert_eq!(
            find_group_id(GROUP, &Identity::Name("www-data".to_string())),
            Some(33)
        );
        assert_eq!(find_group_id(GROUP, &Identity::Id(77)), Some(77));
        assert_eq!(find_group_id(GROUP, &Identity::Name("missing".to_string())), None);
    }
}
