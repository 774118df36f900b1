// src/manager/unpack.rs

//! SmartUnpack: bring a package to the unpacked state
//!
//! Before the unpack primitive runs, every obstruction to it is cleared:
//! PreDepends get configured, conflicting packages are unpacked first or
//! removed early, and broken packages are unpacked first or removed.
//! Installed packages that conflict with the new version are then removed.

use super::Driver;
use crate::error::{Error, Result};
use crate::graph::{DepKind, DependencyGroup, DependencyId, MultiArch, PackageId, PkgState};
use crate::observer::OrderEvent;
use crate::order::OrderFlags;
use crate::version::DebVersion;
use std::path::Path;
use tracing::debug;

impl Driver<'_> {
    /// Unpack a package; configure it too when `immediate` and the package is immediate
    pub(super) fn smart_unpack(&mut self, pkg: PackageId, immediate: bool) -> Result<()> {
        self.unpacking.push(pkg);
        let result = self.unpack_package(pkg, immediate);
        self.unpacking.pop();
        result
    }

    fn unpack_package(&mut self, pkg: PackageId, immediate: bool) -> Result<()> {
        let graph = self.graph;
        let name = self.name(pkg);
        self.emit(OrderEvent::UnpackStart {
            package: &name,
            immediate,
        });

        // Already unpacked on the system, only configuration is pending
        if graph.package(pkg).state() == PkgState::NeedsConfigure && self.cache.state(pkg).keep()
        {
            self.list.set_state(pkg, OrderFlags::UNPACKED);
            if immediate
                && self.list.is_flag(pkg, OrderFlags::IMMEDIATE)
                && let Err(err) = self.smart_configure(pkg)
            {
                self.warn(
                    pkg,
                    &format!("could not perform immediate configuration on already unpacked package: {err}"),
                );
            }
            return Ok(());
        }

        let Some(inst) = self.cache.install_version(pkg) else {
            return Err(Error::operation("unpack", &name, "no version to install"));
        };
        let version = graph.version(inst);

        for group in &version.groups {
            match group.kind {
                DepKind::PreDepends => self.unpack_pre_depends(pkg, &name, group)?,
                DepKind::Conflicts | DepKind::Obsoletes => self.unpack_conflicts(pkg, &name, group)?,
                DepKind::Breaks => self.unpack_breaks(pkg, &name, group)?,
                DepKind::Depends => {}
            }
        }

        self.check_rconflicts(pkg, graph.reverse_depends(pkg), Some(&version.version))
            .map_err(|err| match err {
                Error::EarlyRemove { .. } => Error::ReverseConflict {
                    package: name.clone(),
                },
                other => other,
            })?;
        for provide in &version.provides {
            if let Err(err) = self.check_rconflicts(
                pkg,
                graph.reverse_depends(provide.package),
                provide.version.as_ref(),
            ) {
                self.warn(
                    pkg,
                    &format!(
                        "reverse conflicts on provided {} not cleared: {err}",
                        graph.package(provide.package).name
                    ),
                );
            }
        }

        self.list.set_state(pkg, OrderFlags::UNPACKED);

        if version.multi_arch == MultiArch::Same {
            let reinstall = self.cache.state(pkg).reinstall;
            for &sibling in graph.group_members(pkg) {
                if sibling == pkg
                    || !self.list.is_now(sibling)
                    || self.unpacking.contains(&sibling)
                {
                    continue;
                }
                let Some(sibling_inst) = self.cache.install_version(sibling) else {
                    continue;
                };
                if graph.package(sibling).current_version == Some(sibling_inst) && !reinstall {
                    continue;
                }
                debug!("Unpacking multi-arch sibling {}", self.name(sibling));
                self.smart_unpack(sibling, false)?;
            }
        }

        let archive = self
            .archives
            .get(&pkg)
            .map(|path| path.as_path())
            .unwrap_or(Path::new(""));
        self.installer
            .unpack(graph.package(pkg), version, archive)?;

        if immediate
            && self.list.is_flag(pkg, OrderFlags::IMMEDIATE)
            && let Err(err) = self.smart_configure(pkg)
        {
            self.warn(
                pkg,
                &format!("could not perform immediate configuration: {err}"),
            );
        }

        Ok(())
    }

    /// Configure one alternative of a PreDepends group before unpacking
    fn unpack_pre_depends(&mut self, pkg: PackageId, name: &str, group: &DependencyGroup) -> Result<()> {
        let graph = self.graph;
        debug!("PreDepends order for {}", name);

        for (i, &dep) in group.alternatives.iter().enumerate() {
            let targets = graph.all_targets(dep);

            // A settled installed version already satisfies it
            let mut satisfied_by = targets.iter().copied().find_map(|ver| {
                let target = graph.version(ver).package;
                let package = graph.package(target);
                (package.current_version == Some(ver)
                    && self.list.is_now(target)
                    && package.state() == PkgState::NeedsNothing)
                    .then_some(target)
            });

            for &ver in &targets {
                if satisfied_by.is_some() {
                    break;
                }
                let target = graph.version(ver).package;
                let state = *self.cache.state(target);
                if state.install_version != Some(ver)
                    || (state.keep() && graph.package(target).state() == PkgState::NeedsNothing)
                {
                    continue;
                }
                if self.list.is_flag(target, OrderFlags::CONFIGURED) {
                    satisfied_by = Some(target);
                    continue;
                }

                debug!("Trying to configure {} for {}", self.name(target), name);
                match self.configure_pre_dependency(pkg, target) {
                    Ok(()) => satisfied_by = Some(target),
                    Err(err) => debug!("Pre-dependency {} not configured: {}", self.name(target), err),
                }
            }

            if let Some(target) = satisfied_by {
                let target = self.name(target);
                self.emit(OrderEvent::PreDependSatisfied {
                    package: name,
                    target: &target,
                });
                return Ok(());
            }

            if i + 1 == group.alternatives.len() {
                return Err(Error::PreDependCycle {
                    target: graph.package(graph.dependency(dep).target).full_name(),
                    package: name.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Unpack a pre-dependency if it is still pending, then configure it
    ///
    /// A target whose own unpack is further up the stack pre-depends back on
    /// this package; it cannot be unpacked first and is refused.
    fn configure_pre_dependency(&mut self, pkg: PackageId, target: PackageId) -> Result<()> {
        if target == pkg {
            return Err(Error::operation("configure", &self.name(pkg), "pre-depends on itself"));
        }
        if self.list.is_now(target) {
            if self.unpacking.contains(&target) {
                return Err(Error::operation(
                    "unpack",
                    &self.name(target),
                    "already being unpacked",
                ));
            }
            self.smart_unpack(target, false)?;
        }
        if self.list.is_flag(target, OrderFlags::CONFIGURED) {
            return Ok(());
        }
        self.smart_configure(target)
    }

    /// Clear installed packages this one conflicts with or obsoletes
    fn unpack_conflicts(&mut self, pkg: PackageId, name: &str, group: &DependencyGroup) -> Result<()> {
        let graph = self.graph;

        for &dep in &group.alternatives {
            for ver in graph.all_targets(dep) {
                let other = graph.version(ver).package;
                if graph.package(other).current_version != Some(ver) || !self.list.is_now(other) {
                    continue;
                }
                let other_name = self.name(other);

                if !self.list.is_flag(other, OrderFlags::LOOP) {
                    let state = *self.cache.state(other);
                    if !state.keep() && state.install_version.is_some() {
                        self.emit(OrderEvent::ConflictUnpackFirst {
                            package: name,
                            target: &other_name,
                        });
                        self.list.flag(pkg, OrderFlags::LOOP);
                        if let Err(err) = self.smart_unpack(other, false) {
                            debug!("Could not unpack {} first: {}", other_name, err);
                            self.emit(OrderEvent::ConflictEarlyRemove {
                                package: name,
                                target: &other_name,
                            });
                            self.require_early_remove(other)?;
                        }
                    } else {
                        self.emit(OrderEvent::ConflictEarlyRemove {
                            package: name,
                            target: &other_name,
                        });
                        self.require_early_remove(other)?;
                    }
                } else if !self.list.is_flag(other, OrderFlags::REMOVED) {
                    self.emit(OrderEvent::KnotRemove {
                        package: name,
                        target: &other_name,
                    });
                    self.require_early_remove(other)?;
                }
            }
        }

        Ok(())
    }

    /// Relieve packages this one breaks
    fn unpack_breaks(&mut self, pkg: PackageId, name: &str, group: &DependencyGroup) -> Result<()> {
        let graph = self.graph;

        for &dep in &group.alternatives {
            for ver in graph.all_targets(dep) {
                let other = graph.version(ver).package;
                let other_name = self.name(other);
                let delete = self.cache.state(other).delete();

                if self.list.is_flag(other, OrderFlags::IN_LIST)
                    && !delete
                    && !self.list.is_flag(other, OrderFlags::LOOP)
                    && self.list.is_now(other)
                {
                    self.list.flag(pkg, OrderFlags::LOOP);
                    self.emit(OrderEvent::BreakUnpackFirst {
                        package: name,
                        target: &other_name,
                    });
                    self.smart_unpack(other, false)?;
                }

                if delete && !self.list.is_flag(other, OrderFlags::CONFIGURED) {
                    self.emit(OrderEvent::BreakRemove {
                        package: name,
                        target: &other_name,
                    });
                    self.smart_remove(other)?;
                }
            }
        }

        Ok(())
    }

    /// Early-remove installed packages whose Conflicts/Obsoletes match `version`
    ///
    /// `deps` are the reverse dependencies of the package or of one of its
    /// provides; `version` is the package version or the provided version.
    pub(super) fn check_rconflicts(
        &mut self,
        pkg: PackageId,
        deps: &[DependencyId],
        version: Option<&DebVersion>,
    ) -> Result<()> {
        let graph = self.graph;

        for &dep in deps {
            let dep = graph.dependency(dep);
            if !matches!(dep.kind, DepKind::Conflicts | DepKind::Obsoletes) {
                continue;
            }
            if !self.list.is_now(pkg) {
                continue;
            }

            // Ignore self conflicts and versions that are not installed
            let parent = graph.version(dep.parent).package;
            if parent == pkg || graph.package(parent).current_version != Some(dep.parent) {
                continue;
            }
            if !dep.constraint.satisfied_by(version) {
                continue;
            }

            debug!(
                "{} conflicts with the new {}, removing it early",
                graph.describe_version(dep.parent),
                self.name(pkg)
            );
            self.require_early_remove(parent)?;
        }

        Ok(())
    }

    /// Early removal that must succeed
    fn require_early_remove(&mut self, pkg: PackageId) -> Result<()> {
        if self.early_remove(pkg)? {
            Ok(())
        } else {
            Err(Error::EarlyRemove {
                package: self.name(pkg),
            })
        }
    }
}
