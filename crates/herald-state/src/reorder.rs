//! Role hierarchy reordering
//!
//! Moving a role from `current` to `target` reassigns every position in the
//! range `[min, max]` of the two:
//! 1. Validate the target and the role
//! 2. Collect the other roles inside the range
//! 3. Order them by position, highest first (stable)
//! 4. Put the moved role first when moving down, last when moving up
//! 5. Hand out positions `min, min + 1, ...` in that order, at most up to `max + 1`
//!
//! The result is a contiguous, strictly increasing run over the range and a
//! batch of [`RoleMove`]s to submit in one remote call.

use herald_core::{Guild, GuildId, HeraldError, HeraldResult, Role, RoleId, RoleMove, Roles};

/// Compute the moves for relocating `role_id` to `target` without touching the roles
pub fn compute_moves(
    roles: &Roles,
    guild_id: GuildId,
    role_id: RoleId,
    target: i32,
) -> HeraldResult<Vec<RoleMove>> {
    // Stage 1: Validation
    if target <= 0 {
        return Err(HeraldError::PositionBounds { position: target });
    }
    if role_id == RoleId::everyone(guild_id) {
        return Err(HeraldError::UnmovableDefaultRole);
    }
    let moved = roles.get(role_id).ok_or(HeraldError::RoleNotFound(role_id))?;

    // Stage 2: Collect the affected range
    let current = moved.position;
    let lo = target.min(current);
    let hi = target.max(current);

    let mut shifted: Vec<&Role> = roles
        .iter()
        .filter(|r| r.id != role_id && (lo..=hi).contains(&r.position))
        .collect();

    // Stage 3: Highest first; sort_by is stable so ties keep delivery order
    shifted.sort_by(|a, b| b.position.cmp(&a.position));

    // Stage 4: Place the moved role
    if target == lo {
        shifted.insert(0, moved);
    } else {
        shifted.push(moved);
    }

    // Stage 5: Contiguous reassignment; one spare slot absorbs a duplicate position
    let moves = shifted
        .iter()
        .zip(lo..=hi.saturating_add(1))
        .map(|(role, position)| RoleMove::new(role.id, position))
        .collect();

    Ok(moves)
}

/// Write computed positions back into the local roles
pub fn apply_moves(roles: &mut Roles, moves: &[RoleMove]) {
    for mv in moves {
        if let Some(role) = roles.get_mut(mv.id) {
            role.position = mv.position;
        }
    }
}

/// Compute the moves for a guild and apply them locally
///
/// Local positions are updated right away so later moves see a consistent
/// order even before the remote reorder is acknowledged.
pub fn plan_move(guild: &mut Guild, role_id: RoleId, target: i32) -> HeraldResult<Vec<RoleMove>> {
    let moves = compute_moves(&guild.roles, guild.id, role_id, target)?;
    apply_moves(&mut guild.roles, &moves);
    Ok(moves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GUILD: GuildId = GuildId(1);

    /// Default role at 0 plus one role per entry, ids 100, 101, ...
    fn guild_with_positions(positions: &[i32]) -> Guild {
        let mut guild = Guild::new(GUILD, "test");
        guild.roles.upsert(Role::new(RoleId::everyone(GUILD), GUILD, 0));
        for (i, &pos) in positions.iter().enumerate() {
            guild
                .roles
                .upsert(Role::new(RoleId::new(100 + i as u64), GUILD, pos));
        }
        guild
    }

    fn position_of(guild: &Guild, id: u64) -> i32 {
        guild.role(RoleId::new(id)).unwrap().position
    }

    #[test]
    fn test_move_up_reverses_range() {
        // Roles at [0, 1, 2, 3, 4]; ids 100..=104 sit at 0..=4 with no default role
        let mut guild = Guild::new(GUILD, "test");
        for pos in 0..5 {
            guild
                .roles
                .upsert(Role::new(RoleId::new(100 + pos as u64), GUILD, pos));
        }

        let moves = plan_move(&mut guild, RoleId::new(102), 4).unwrap();

        assert_eq!(
            moves,
            vec![
                RoleMove::new(RoleId::new(104), 2),
                RoleMove::new(RoleId::new(103), 3),
                RoleMove::new(RoleId::new(102), 4),
            ]
        );
        assert_eq!(position_of(&guild, 102), 4);
        assert_eq!(position_of(&guild, 104), 2);
        assert_eq!(position_of(&guild, 100), 0);
    }

    #[test]
    fn test_move_down_prepends_moved_role() {
        let mut guild = guild_with_positions(&[1, 2, 3, 4]);

        let moves = plan_move(&mut guild, RoleId::new(103), 2).unwrap();

        assert_eq!(
            moves,
            vec![
                RoleMove::new(RoleId::new(103), 2),
                RoleMove::new(RoleId::new(102), 3),
                RoleMove::new(RoleId::new(101), 4),
            ]
        );
        assert_eq!(position_of(&guild, 100), 1);
    }

    #[test]
    fn test_move_to_current_position() {
        let mut guild = guild_with_positions(&[1, 2, 3]);
        let moves = plan_move(&mut guild, RoleId::new(101), 2).unwrap();
        assert_eq!(moves, vec![RoleMove::new(RoleId::new(101), 2)]);
    }

    #[test]
    fn test_non_positive_target_rejected() {
        let mut guild = guild_with_positions(&[1, 2]);
        for target in [0, -1, i32::MIN] {
            let err = plan_move(&mut guild, RoleId::new(100), target).unwrap_err();
            assert!(matches!(err, HeraldError::PositionBounds { position } if position == target));
        }
        // Bounds are checked before anything else, even for unknown roles
        let err = plan_move(&mut guild, RoleId::new(999), 0).unwrap_err();
        assert!(matches!(err, HeraldError::PositionBounds { .. }));
    }

    #[test]
    fn test_default_role_never_moves() {
        let mut guild = guild_with_positions(&[1, 2, 3]);
        for target in 1..=5 {
            let err = plan_move(&mut guild, RoleId::everyone(GUILD), target).unwrap_err();
            assert!(matches!(err, HeraldError::UnmovableDefaultRole));
        }
        assert_eq!(guild.default_role().unwrap().position, 0);
    }

    #[test]
    fn test_unknown_role() {
        let mut guild = guild_with_positions(&[1]);
        let err = plan_move(&mut guild, RoleId::new(7), 1).unwrap_err();
        assert!(matches!(err, HeraldError::RoleNotFound(id) if id == RoleId::new(7)));
    }

    #[test]
    fn test_duplicate_position_spills_past_range() {
        // Two roles share position 2; moving 100 from 1 to 2 needs a slot at 3
        let mut guild = guild_with_positions(&[1, 2, 2]);

        let moves = plan_move(&mut guild, RoleId::new(100), 2).unwrap();

        assert_eq!(
            moves,
            vec![
                RoleMove::new(RoleId::new(101), 1),
                RoleMove::new(RoleId::new(102), 2),
                RoleMove::new(RoleId::new(100), 3),
            ]
        );
    }

    #[test]
    fn test_gap_in_range_compacts() {
        let mut guild = guild_with_positions(&[1, 5]);

        let moves = plan_move(&mut guild, RoleId::new(101), 2).unwrap();

        assert_eq!(moves, vec![RoleMove::new(RoleId::new(101), 2)]);
        assert_eq!(position_of(&guild, 100), 1);
    }

    #[test]
    fn test_compute_leaves_roles_untouched() {
        let guild = guild_with_positions(&[1, 2, 3]);
        let before = guild.roles.clone();
        let moves = compute_moves(&guild.roles, GUILD, RoleId::new(100), 3).unwrap();
        assert_eq!(moves.len(), 3);
        assert_eq!(guild.roles, before);
    }

    /// Shuffled distinct positions 1..=n for n roles
    fn shuffled_positions() -> impl Strategy<Value = Vec<i32>> {
        (1usize..12)
            .prop_flat_map(|n| Just((1..=n as i32).collect::<Vec<_>>()).prop_shuffle())
    }

    proptest! {
        #[test]
        fn prop_moves_are_contiguous(positions in shuffled_positions(), pick in any::<prop::sample::Index>(), target in 1i32..16) {
            let mut guild = guild_with_positions(&positions);
            let idx = pick.index(positions.len());
            let id = RoleId::new(100 + idx as u64);
            let current = positions[idx];

            let moves = plan_move(&mut guild, id, target).unwrap();

            let lo = current.min(target);
            for (i, mv) in moves.iter().enumerate() {
                prop_assert_eq!(mv.position, lo + i as i32);
            }

            let moved_at = moves.iter().position(|m| m.id == id).unwrap();
            if target <= current {
                prop_assert_eq!(moved_at, 0);
            } else {
                prop_assert_eq!(moved_at, moves.len() - 1);
            }

            // Positions stay distinct across the whole guild
            let mut all: Vec<i32> = guild.roles.iter().map(|r| r.position).collect();
            all.sort_unstable();
            all.dedup();
            prop_assert_eq!(all.len(), guild.roles.len());
        }

        #[test]
        fn prop_move_and_back_restores(positions in shuffled_positions(), pick in any::<prop::sample::Index>(), target_pick in any::<prop::sample::Index>()) {
            let mut guild = guild_with_positions(&positions);
            let before = guild.roles.clone();
            let idx = pick.index(positions.len());
            let id = RoleId::new(100 + idx as u64);
            let current = positions[idx];
            let target = target_pick.index(positions.len()) as i32 + 1;

            plan_move(&mut guild, id, target).unwrap();
            prop_assert_eq!(position_of(&guild, 100 + idx as u64), target);

            plan_move(&mut guild, id, current).unwrap();
            prop_assert_eq!(guild.roles, before);
        }
    }
}
